// src/ingest/processor.rs
//! One topic through one source: limiter -> (timeout) -> source, under the
//! retry policy, with failures folded into an inline error string.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{SourceKind, TopicOutcome, TopicSource};
use crate::agent::ToolAgent;
use crate::config::SourcePolicy;
use crate::errors::{BriefingError, Result};
use crate::pacing::{RateLimiter, RetryPolicy, SharedClock};

pub struct TopicProcessor {
    source: Arc<dyn TopicSource>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    attempt_timeout: Option<Duration>,
    clock: SharedClock,
}

impl TopicProcessor {
    pub fn new(
        source: Arc<dyn TopicSource>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            source,
            limiter,
            retry,
            attempt_timeout: None,
            clock,
        }
    }

    /// Build from a source policy. The limiter is passed in because it outlives
    /// a single batch.
    pub fn from_policy(
        source: Arc<dyn TopicSource>,
        policy: &SourcePolicy,
        limiter: Arc<RateLimiter>,
        clock: SharedClock,
    ) -> Self {
        let retry = RetryPolicy::new(
            policy.max_attempts,
            policy.backoff_min(),
            policy.backoff_max(),
        );
        Self::new(source, limiter, retry, clock).with_attempt_timeout(policy.attempt_timeout())
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Retried run for one topic; errors are returned, not folded.
    pub async fn attempt(&self, topic: &str, agent: &dyn ToolAgent) -> Result<String> {
        let label = self.kind().name();
        self.retry
            .run(label, self.clock.as_ref(), |_attempt| async move {
                self.limiter.acquire().await;
                match self.attempt_timeout {
                    Some(limit) => tokio::time::timeout(limit, self.source.summarize(topic, agent))
                        .await
                        .map_err(|_| BriefingError::Timeout(limit))?,
                    None => self.source.summarize(topic, agent).await,
                }
            })
            .await
    }

    /// Never fails: whatever survives the retry policy becomes `"Error: ..."`.
    pub async fn process(&self, topic: &str, agent: &dyn ToolAgent) -> TopicOutcome {
        let source = self.kind().name();
        match self.attempt(topic, agent).await {
            Ok(summary) => {
                info!(target: "ingest", source, topic, chars = summary.len(), "topic summarized");
                counter!("briefing_topics_total", "source" => source, "outcome" => "ok")
                    .increment(1);
                TopicOutcome::Summary(summary)
            }
            Err(e) => {
                warn!(target: "ingest", source, topic, error = %e, "topic failed");
                counter!("briefing_topics_total", "source" => source, "outcome" => "error")
                    .increment(1);
                TopicOutcome::from_error(&e)
            }
        }
    }
}
