// src/ingest/orchestrator.rs
//! Walks a batch of topics through one processor, one topic at a time.

use metrics::counter;
use tracing::{info, warn};

use super::processor::TopicProcessor;
use super::{ensure_metrics_described, unique_topics, SourceKind, SourceResult};
use crate::agent::{AgentConnector, AgentSession, ToollessSession};
use crate::pacing::SharedClock;
use std::time::Duration;

pub struct SourceOrchestrator {
    processor: TopicProcessor,
    pause: Duration,
    clock: SharedClock,
}

impl SourceOrchestrator {
    /// `pause` is slept after every topic, success or not.
    pub fn new(processor: TopicProcessor, pause: Duration, clock: SharedClock) -> Self {
        Self {
            processor,
            pause,
            clock,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.processor.kind()
    }

    /// Process `topics` against an already-open session. Every distinct
    /// topic string becomes a key exactly as given.
    pub async fn run<S: AsRef<str>>(&self, topics: &[S], session: &dyn AgentSession) -> SourceResult {
        ensure_metrics_described();
        let kind = self.kind();
        let mut result = SourceResult::new(kind);
        for topic in unique_topics(topics) {
            let outcome = self.processor.process(&topic, session.agent()).await;
            result.insert(&topic, outcome);
            self.clock.sleep(self.pause).await;
        }
        info!(
            target: "ingest",
            source = kind.name(),
            topics = result.len(),
            failed = result.failures(),
            "source batch done"
        );
        result
    }

    /// Open a session, run the batch, close the session.
    ///
    /// A session that cannot be opened fails the whole batch for this source:
    /// every topic gets the open error as its result. If the returned future
    /// is dropped mid-batch, the session is still closed.
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        topics: &[S],
        connector: &dyn AgentConnector,
    ) -> SourceResult {
        ensure_metrics_described();
        let kind = self.kind();
        let topics = unique_topics(topics);
        if topics.is_empty() {
            return SourceResult::new(kind);
        }

        let session = match connector.open().await {
            Ok(s) => SessionGuard::new(kind, s),
            Err(e) => {
                warn!(
                    target: "ingest",
                    source = kind.name(),
                    connector = connector.name(),
                    error = %e,
                    "agent session failed to open"
                );
                counter!("briefing_session_open_failures_total", "source" => kind.name())
                    .increment(1);
                return SourceResult::failed_all(kind, &topics, &e);
            }
        };

        let result = self.run(&topics, session.get()).await;
        session.close().await;
        result
    }
}

/// Owns a batch's session until it is closed. Dropped while still holding
/// the session (the batch future was cancelled), it hands the session to a
/// background task that closes it.
struct SessionGuard {
    kind: SourceKind,
    session: Option<Box<dyn AgentSession>>,
}

impl SessionGuard {
    fn new(kind: SourceKind, session: Box<dyn AgentSession>) -> Self {
        Self {
            kind,
            session: Some(session),
        }
    }

    fn get(&self) -> &dyn AgentSession {
        match &self.session {
            Some(s) => &**s,
            None => &ToollessSession,
        }
    }

    async fn close(mut self) {
        if let Some(session) = self.session.take() {
            close_session(self.kind, session).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let kind = self.kind;
        warn!(target: "ingest", source = kind.name(), "batch cancelled, closing agent session");
        // Outside a runtime the session's own drop is all that is left.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(close_session(kind, session));
        }
    }
}

async fn close_session(kind: SourceKind, mut session: Box<dyn AgentSession>) {
    if let Err(e) = session.close().await {
        warn!(target: "ingest", source = kind.name(), error = %e, "agent session close failed");
    }
}
