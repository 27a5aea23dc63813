// src/agent/mcp.rs
//! MCP client over a stdio subprocess (JSON-RPC 2.0, one message per line).
//!
//! Sequence on open: spawn -> `initialize` -> `notifications/initialized`
//! -> paginated `tools/list`. Requests are serialized behind one lock; a
//! session drives at most one topic at a time anyway.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::react::{ChatTurns, ReactAgent, ToolInvoker};
use super::{AgentConnector, AgentSession, ToolAgent, ToolSpec};
use crate::config::McpServerConfig;
use crate::errors::{BriefingError, Result};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct McpClient {
    label: String,
    io: Mutex<Option<McpIo>>,
    child: Mutex<Option<Child>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

struct McpIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl McpIo {
    async fn send(&mut self, msg: &Value) -> Result<()> {
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BriefingError::Connection(format!("writing to MCP server: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| BriefingError::Connection(format!("flushing MCP server stdin: {e}")))
    }

    /// Read until the response carrying `id`, answering server-initiated
    /// requests and skipping notifications / non-JSON log lines on the way.
    async fn read_response(&mut self, id: u64, method: &str) -> Result<Value> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| BriefingError::Connection(format!("reading MCP server output: {e}")))?
                .ok_or_else(|| BriefingError::Connection("MCP server closed its output".into()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let msg: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(_) => {
                    debug!(target: "agent", line, "non-JSON line from MCP server");
                    continue;
                }
            };

            if let Some(server_method) = msg.get("method").and_then(Value::as_str) {
                if let Some(req_id) = msg.get("id").cloned() {
                    let reply = if server_method == "ping" {
                        json!({"jsonrpc": "2.0", "id": req_id, "result": {}})
                    } else {
                        json!({
                            "jsonrpc": "2.0",
                            "id": req_id,
                            "error": {"code": -32601, "message": "method not supported by client"}
                        })
                    };
                    self.send(&reply).await?;
                }
                continue;
            }

            if msg.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(err) = msg.get("error") {
                let text = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(BriefingError::from_upstream_message(format!(
                    "MCP {method} failed: {text}"
                )));
            }
            return Ok(msg.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

impl McpClient {
    /// Start the server process. The child is killed if this client is dropped.
    pub async fn spawn(cfg: &McpServerConfig) -> Result<Self> {
        let mut child = Command::new(&cfg.command)
            .args(&cfg.args)
            .envs(cfg.child_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BriefingError::Connection(format!("failed to start MCP server '{}': {e}", cfg.command))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BriefingError::Connection("MCP server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BriefingError::Connection("MCP server stdout unavailable".into()))?;

        Ok(Self {
            label: format!("{} {}", cfg.command, cfg.args.join(" ")),
            io: Mutex::new(Some(McpIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            })),
            child: Mutex::new(Some(child)),
            next_id: AtomicU64::new(1),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs.max(1)),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let msg = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| BriefingError::Connection("MCP session already closed".into()))?;
        let exchange = async {
            io.send(&msg).await?;
            io.read_response(id, method).await
        };
        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(res) => res,
            Err(_) => Err(BriefingError::Timeout(self.request_timeout)),
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let msg = json!({"jsonrpc": "2.0", "method": method, "params": params});
        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| BriefingError::Connection("MCP session already closed".into()))?;
        io.send(&msg).await
    }

    pub async fn initialize(&self) -> Result<()> {
        let res = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "briefcast", "version": env!("CARGO_PKG_VERSION")}
                }),
            )
            .await?;
        let server = res
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!(target: "agent", server, command = %self.label, "MCP initialized");
        self.notify("notifications/initialized", json!({})).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({"cursor": c}),
                None => json!({}),
            };
            let res = self.request("tools/list", params).await?;
            tools.extend(parse_tools(&res));
            cursor = res
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                return Ok(tools);
            }
        }
    }

    pub async fn call_tool(&self, name: &str, args: Value) -> Result<String> {
        let res = self
            .request("tools/call", json!({"name": name, "arguments": args}))
            .await?;
        let text = tool_result_text(&res);
        if res.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(BriefingError::from_upstream_message(format!(
                "tool {name} failed: {text}"
            )));
        }
        Ok(text)
    }

    /// Close stdin, give the server a moment to exit, then kill it.
    pub async fn shutdown(&self) -> Result<()> {
        drop(self.io.lock().await.take());
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(target: "agent", %status, "MCP server exited"),
                Ok(Err(e)) => return Err(BriefingError::Io(e)),
                Err(_) => {
                    warn!(target: "agent", command = %self.label, "MCP server did not exit, killing");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ToolInvoker for McpClient {
    async fn call_tool(&self, name: &str, args: Value) -> Result<String> {
        McpClient::call_tool(self, name, args).await
    }
}

fn parse_tools(res: &Value) -> Vec<ToolSpec> {
    res.get("tools")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|t| {
                    let name = t.get("name")?.as_str()?.to_string();
                    Some(ToolSpec {
                        name,
                        description: t
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        input_schema: t.get("inputSchema").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn tool_result_text(res: &Value) -> String {
    res.get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

// ------------------------------------------------------------
// Session + connector
// ------------------------------------------------------------

pub struct McpSession {
    client: Arc<McpClient>,
    tools: Vec<ToolSpec>,
    agent: ReactAgent,
}

#[async_trait]
impl AgentSession for McpSession {
    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    fn agent(&self) -> &dyn ToolAgent {
        &self.agent
    }

    async fn close(&mut self) -> Result<()> {
        self.client.shutdown().await
    }
}

/// Opens an [`McpSession`] per batch: one subprocess, its tools, and an agent
/// driving them with the generative model.
pub struct McpConnector {
    server: McpServerConfig,
    model: Arc<dyn ChatTurns>,
}

impl McpConnector {
    pub fn new(server: McpServerConfig, model: Arc<dyn ChatTurns>) -> Self {
        Self { server, model }
    }
}

#[async_trait]
impl AgentConnector for McpConnector {
    async fn open(&self) -> Result<Box<dyn AgentSession>> {
        if self.server.api_token.trim().is_empty() {
            return Err(BriefingError::Config("Missing API_TOKEN for MCP server".into()));
        }
        let client = Arc::new(McpClient::spawn(&self.server).await?);
        client.initialize().await?;
        let tools = client.list_tools().await?;
        info!(target: "agent", tools = tools.len(), "tool session opened");

        let invoker: Arc<dyn ToolInvoker> = client.clone();
        let agent = ReactAgent::new(
            self.model.clone(),
            invoker,
            &tools,
            self.server.max_agent_steps,
        );
        Ok(Box::new(McpSession {
            client,
            tools,
            agent,
        }))
    }

    fn name(&self) -> &'static str {
        "mcp"
    }
}
