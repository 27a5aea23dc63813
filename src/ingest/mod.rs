// src/ingest/mod.rs
//! Per-source topic pipelines.
//!
//! A [`TopicSource`] knows how to turn one topic into a spoken summary
//! (news: scrape + headlines + model; reddit: tool agent + polish pass).
//! [`processor::TopicProcessor`] wraps it with rate limiting, retry and the
//! per-topic error boundary; [`orchestrator::SourceOrchestrator`] walks a
//! batch of topics through it sequentially.

pub mod news;
pub mod orchestrator;
pub mod processor;
pub mod reddit;

use async_trait::async_trait;
use indexmap::IndexMap;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::fmt;

use crate::agent::ToolAgent;
use crate::errors::{BriefingError, Result};

pub use news::NewsSource;
pub use orchestrator::SourceOrchestrator;
pub use processor::TopicProcessor;
pub use reddit::RedditSource;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "briefing_topics_total",
            "Topics processed, by source and outcome."
        );
        describe_counter!(
            "briefing_retries_total",
            "Overloaded attempts that were retried."
        );
        describe_counter!(
            "briefing_session_open_failures_total",
            "Agent sessions that failed to open."
        );
        describe_histogram!(
            "briefing_rate_limit_wait_ms",
            "Time spent waiting on a source rate limiter."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    News,
    Reddit,
}

impl SourceKind {
    /// Key the source's mapping is published under.
    pub fn key(self) -> &'static str {
        match self {
            SourceKind::News => "news_analysis",
            SourceKind::Reddit => "reddit_analysis",
        }
    }

    /// Short label for logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::News => "news",
            SourceKind::Reddit => "reddit",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result for one topic: a summary, or the inline error text that replaced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicOutcome {
    Summary(String),
    Failed(String),
}

impl TopicOutcome {
    pub fn from_error(err: &BriefingError) -> Self {
        TopicOutcome::Failed(format!("Error: {err}"))
    }

    pub fn as_text(&self) -> &str {
        match self {
            TopicOutcome::Summary(s) | TopicOutcome::Failed(s) => s,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TopicOutcome::Failed(_))
    }
}

/// `topic -> summary-or-error` for one source run, in submission order.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResult {
    kind: SourceKind,
    topics: IndexMap<String, TopicOutcome>,
}

impl SourceResult {
    pub(crate) fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            topics: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, topic: &str, outcome: TopicOutcome) {
        self.topics.insert(topic.to_string(), outcome);
    }

    pub fn from_outcomes<I, T>(kind: SourceKind, outcomes: I) -> Self
    where
        I: IntoIterator<Item = (T, TopicOutcome)>,
        T: Into<String>,
    {
        Self {
            kind,
            topics: outcomes
                .into_iter()
                .map(|(t, o)| (t.into(), o))
                .collect(),
        }
    }

    /// Every topic carries the same failure; used when the session never opened.
    pub fn failed_all(kind: SourceKind, topics: &[String], err: &BriefingError) -> Self {
        let mut out = Self::new(kind);
        for t in topics {
            out.insert(t, TopicOutcome::from_error(err));
        }
        out
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn key(&self) -> &'static str {
        self.kind.key()
    }

    pub fn get(&self, topic: &str) -> Option<&TopicOutcome> {
        self.topics.get(topic)
    }

    /// Text for `topic` (summary or error string).
    pub fn text(&self, topic: &str) -> Option<&str> {
        self.get(topic).map(TopicOutcome::as_text)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicOutcome)> {
        self.topics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn failures(&self) -> usize {
        self.topics.values().filter(|o| o.is_failed()).count()
    }

    /// `{"<source_key>": {"<topic>": "<text>"}}`
    pub fn to_json(&self) -> Value {
        let inner: Map<String, Value> = self
            .topics
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.as_text().to_string())))
            .collect();
        let mut outer = Map::new();
        outer.insert(self.key().to_string(), Value::Object(inner));
        Value::Object(outer)
    }
}

/// Turns one topic into a spoken summary. Errors propagate; the processor
/// owns retrying and the per-topic error boundary.
#[async_trait]
pub trait TopicSource: Send + Sync {
    fn kind(&self) -> SourceKind;
    async fn summarize(&self, topic: &str, agent: &dyn ToolAgent) -> Result<String>;
}

/// Exact-string dedup, first occurrence wins. Topics are used verbatim as
/// result keys, so nothing is trimmed here.
pub fn unique_topics<S: AsRef<str>>(topics: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(topics.len());
    for t in topics {
        let t = t.as_ref();
        if !out.iter().any(|seen| seen == t) {
            out.push(t.to_string());
        }
    }
    out
}

/// Request-edge cleanup: trim, drop blanks and repeats, keep first-seen order.
pub fn normalize_topics<S: AsRef<str>>(topics: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(topics.len());
    for t in topics {
        let t = t.as_ref().trim();
        if !t.is_empty() && !out.iter().any(|seen| seen == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_trimmed_and_deduplicated_in_order() {
        let out = normalize_topics(&[" ai ", "rust", "", "ai", "  ", "rust "]);
        assert_eq!(out, vec!["ai", "rust"]);
    }

    #[test]
    fn unique_topics_keeps_strings_verbatim() {
        let out = unique_topics(&[" market rally", "bonds ", "", " market rally"]);
        assert_eq!(out, vec![" market rally", "bonds ", ""]);
    }

    #[test]
    fn source_result_keeps_submission_order() {
        let r = SourceResult::from_outcomes(
            SourceKind::News,
            [
                ("zinc", TopicOutcome::Summary("z".into())),
                ("apples", TopicOutcome::Summary("a".into())),
                ("mango", TopicOutcome::Summary("m".into())),
            ],
        );
        let keys: Vec<&str> = r.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zinc", "apples", "mango"]);

        let json_keys: Vec<String> = r.to_json()["news_analysis"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(json_keys, vec!["zinc", "apples", "mango"]);
    }

    #[test]
    fn source_result_json_shape() {
        let mut r = SourceResult::new(SourceKind::News);
        r.insert("market rally", TopicOutcome::Summary("Stocks rose.".into()));
        r.insert(
            "bonds",
            TopicOutcome::from_error(&BriefingError::Upstream("boom".into())),
        );
        let v = r.to_json();
        assert_eq!(v["news_analysis"]["market rally"], "Stocks rose.");
        assert_eq!(v["news_analysis"]["bonds"], "Error: upstream error: boom");
        assert_eq!(r.failures(), 1);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn failed_all_covers_every_topic() {
        let topics = vec!["a".to_string(), "b".to_string()];
        let r = SourceResult::failed_all(
            SourceKind::Reddit,
            &topics,
            &BriefingError::Connection("no npx".into()),
        );
        assert_eq!(r.key(), "reddit_analysis");
        assert!(r.get("a").unwrap().is_failed());
        assert_eq!(r.text("b"), Some("Error: connection error: no npx"));
    }
}
