// src/errors.rs
//! Error taxonomy shared by the pipeline and its collaborator adapters.
//!
//! Adapters classify failures once, at the boundary, so that retry and
//! propagation decisions dispatch on [`ErrorKind`] instead of message text.

use std::time::Duration;
use thiserror::Error;

/// Word an upstream uses to signal a transient capacity failure.
pub const OVERLOAD_MARKER: &str = "overloaded";

pub type Result<T> = std::result::Result<T, BriefingError>;

#[derive(Debug, Error)]
pub enum BriefingError {
    /// Transient upstream capacity failure. The only retryable kind.
    #[error("upstream overloaded: {0}")]
    Overloaded(String),

    /// Missing or rejected credential / required setting.
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-overload failure from a scrape, agent, model or speech call.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Tool subprocess could not be started or dropped its pipe.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Overloaded,
    Config,
    Upstream,
    Connection,
    Timeout,
    Io,
}

impl BriefingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BriefingError::Overloaded(_) => ErrorKind::Overloaded,
            BriefingError::Config(_) => ErrorKind::Config,
            BriefingError::Upstream(_) => ErrorKind::Upstream,
            BriefingError::Connection(_) => ErrorKind::Connection,
            BriefingError::Timeout(_) => ErrorKind::Timeout,
            BriefingError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_overloaded(&self) -> bool {
        self.kind() == ErrorKind::Overloaded
    }

    /// Classify a free-form provider message: overload if it carries the marker.
    pub fn from_upstream_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if mentions_overload(&message) {
            BriefingError::Overloaded(message)
        } else {
            BriefingError::Upstream(message)
        }
    }

    /// Classify a non-2xx HTTP answer from `service`.
    pub fn from_status(service: &str, status: u16, body: &str) -> Self {
        let body = truncate(body.trim(), 300);
        let message = format!("{service} HTTP {status}: {body}");
        if status == 429 || status == 503 {
            return BriefingError::Overloaded(message);
        }
        BriefingError::from_upstream_message(message)
    }
}

impl From<reqwest::Error> for BriefingError {
    fn from(error: reqwest::Error) -> Self {
        BriefingError::from_upstream_message(error.to_string())
    }
}

impl From<serde_json::Error> for BriefingError {
    fn from(error: serde_json::Error) -> Self {
        BriefingError::Upstream(format!("malformed payload: {error}"))
    }
}

pub fn mentions_overload(message: &str) -> bool {
    message.to_ascii_lowercase().contains(OVERLOAD_MARKER)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}
