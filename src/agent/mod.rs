// src/agent/mod.rs
//! Tool-using agent sessions.
//!
//! A session is opened once per batch and per source, shared by every topic
//! of that batch, and closed when the batch ends. Sessions backed by a
//! subprocess also kill it when dropped, so early returns, panics and
//! cancelled requests never leak the child.

pub mod mcp;
pub mod react;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::{BriefingError, Result};

pub use mcp::{McpClient, McpConnector, McpSession};
pub use react::ReactAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentMessage {
    pub role: AgentRole,
    pub content: String,
}

impl AgentMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AgentRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AgentRole::User,
            content: content.into(),
        }
    }
}

/// A tool exposed by the session's server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Reasoning agent bound to a session's tools.
#[async_trait]
pub trait ToolAgent: Send + Sync {
    /// Run the conversation to a final answer and return its text.
    async fn run(&self, messages: &[AgentMessage]) -> Result<String>;
}

#[async_trait]
pub trait AgentSession: Send + Sync {
    fn tools(&self) -> &[ToolSpec];
    fn agent(&self) -> &dyn ToolAgent;
    /// Tear down the underlying process/connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AgentSession>>;
    fn name(&self) -> &'static str;
}

pub type SharedConnector = Arc<dyn AgentConnector>;

/// Session with no tools and no process, for sources that never call the agent.
pub struct ToollessSession;

struct NoAgent;

#[async_trait]
impl ToolAgent for NoAgent {
    async fn run(&self, _messages: &[AgentMessage]) -> Result<String> {
        Err(BriefingError::Config(
            "no tool agent is bound to this session".into(),
        ))
    }
}

#[async_trait]
impl AgentSession for ToollessSession {
    fn tools(&self) -> &[ToolSpec] {
        &[]
    }

    fn agent(&self) -> &dyn ToolAgent {
        &NoAgent
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct ToollessConnector;

#[async_trait]
impl AgentConnector for ToollessConnector {
    async fn open(&self) -> Result<Box<dyn AgentSession>> {
        Ok(Box::new(ToollessSession))
    }

    fn name(&self) -> &'static str {
        "toolless"
    }
}
