// src/agent/react.rs
//! Function-calling loop: the model picks tools, we run them on the MCP
//! server and feed results back until it answers in plain text.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AgentMessage, AgentRole, ToolAgent, ToolSpec};
use crate::errors::{BriefingError, Result};
use crate::llm::gemini::{
    Content, FunctionDeclaration, GenerateRequest, GenerateResponse, GenerationConfig, Part,
    ToolBlock,
};
use crate::llm::{GeminiClient, GenerationParams};

/// Multi-turn generation with tool declarations.
#[async_trait]
pub trait ChatTurns: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse>;
}

#[async_trait]
impl ChatTurns for GeminiClient {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        GeminiClient::generate(self, req).await
    }
}

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(&self, name: &str, args: Value) -> Result<String>;
}

// Keywords outside the schema subset the function-declaration API accepts.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "$ref",
    "$defs",
    "definitions",
    "additionalProperties",
    "default",
    "examples",
    "const",
    "exclusiveMinimum",
    "exclusiveMaximum",
];

/// Strip keywords the declaration API rejects, recursively.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()) {
                    continue;
                }
                out.insert(k.clone(), sanitize_schema(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

fn declaration_for(tool: &ToolSpec) -> FunctionDeclaration {
    let params = sanitize_schema(&tool.input_schema);
    let has_props = params
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| !p.is_empty())
        .unwrap_or(false);
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: has_props.then_some(params),
    }
}

pub struct ReactAgent {
    model: Arc<dyn ChatTurns>,
    tools: Arc<dyn ToolInvoker>,
    declarations: Vec<FunctionDeclaration>,
    params: GenerationParams,
    max_steps: usize,
}

impl ReactAgent {
    pub fn new(
        model: Arc<dyn ChatTurns>,
        tools: Arc<dyn ToolInvoker>,
        specs: &[ToolSpec],
        max_steps: usize,
    ) -> Self {
        Self {
            model,
            tools,
            declarations: specs.iter().map(declaration_for).collect(),
            params: GenerationParams::AGENT,
            max_steps: max_steps.max(1),
        }
    }

    pub fn declarations(&self) -> &[FunctionDeclaration] {
        &self.declarations
    }

    fn initial_request(&self, messages: &[AgentMessage]) -> GenerateRequest {
        let system = messages
            .iter()
            .filter(|m| m.role == AgentRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let contents = messages
            .iter()
            .filter_map(|m| match m.role {
                AgentRole::User => Some(Content::user_text(&m.content)),
                AgentRole::Assistant => Some(Content::model_text(&m.content)),
                AgentRole::System => None,
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction: (!system.is_empty()).then(|| Content::system(&system)),
            tools: (!self.declarations.is_empty()).then(|| {
                vec![ToolBlock {
                    function_declarations: self.declarations.clone(),
                }]
            }),
            generation_config: GenerationConfig::from(&self.params),
        }
    }
}

#[async_trait]
impl ToolAgent for ReactAgent {
    async fn run(&self, messages: &[AgentMessage]) -> Result<String> {
        let mut req = self.initial_request(messages);

        for step in 1..=self.max_steps {
            let resp = self.model.generate(&req).await?;
            let content = resp.first_content().cloned().ok_or_else(|| {
                BriefingError::Upstream(format!(
                    "agent got an empty candidate (finish_reason={})",
                    resp.finish_reason().unwrap_or("unknown")
                ))
            })?;

            let calls: Vec<_> = content.function_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                let text = content.text();
                if text.trim().is_empty() {
                    return Err(BriefingError::Upstream("agent returned no text".into()));
                }
                debug!(target: "agent", step, "agent finished");
                return Ok(text);
            }

            req.contents.push(content);
            let mut replies = Vec::with_capacity(calls.len());
            for call in calls {
                debug!(target: "agent", step, tool = %call.name, "tool call");
                let response = match self.tools.call_tool(&call.name, call.args.clone()).await {
                    Ok(text) => json!({ "content": text }),
                    // Overload has to reach the retry policy; anything else
                    // is the model's problem to work around.
                    Err(e) if e.is_overloaded() => return Err(e),
                    Err(e) => {
                        warn!(target: "agent", tool = %call.name, error = %e, "tool call failed");
                        json!({ "error": e.to_string() })
                    }
                };
                replies.push(Part::function_response(&call.name, response));
            }
            req.contents.push(Content {
                role: Some("user".to_string()),
                parts: replies,
            });
        }

        Err(BriefingError::Upstream(format!(
            "agent did not finish within {} steps",
            self.max_steps
        )))
    }
}
