// src/pacing/retry.rs
//! Bounded exponential-backoff retry that only repeats overloaded calls.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use metrics::counter;
use tracing::warn;

use super::Clock;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Delay schedule: starts at `min_delay`, doubles, capped at `max_delay`. No jitter.
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.min_delay,
            initial_interval: self.min_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-overload error, or the
    /// attempt budget is spent. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, label: &'static str, clock: &dyn Clock, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut schedule = self.schedule();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_overloaded() && attempt < self.max_attempts => {
                    let delay = schedule.next_backoff().unwrap_or(self.max_delay);
                    warn!(
                        target: "ingest",
                        source = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "overloaded, retrying"
                    );
                    counter!("briefing_retries_total", "source" => label).increment(1);
                    clock.sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BriefingError, ErrorKind};
    use crate::pacing::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn news_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn overload_is_retried_until_budget_then_reraised() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let res: Result<()> = news_policy()
            .run("news", &clock, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BriefingError::Overloaded("Overloaded".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(res.unwrap_err().kind(), ErrorKind::Overloaded);
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 2);
        assert_eq!(sleeps[0], Duration::from_secs(2));
        assert!(sleeps[1] >= Duration::from_secs(2) && sleeps[1] <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let res: Result<()> = news_policy()
            .run("news", &clock, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BriefingError::Upstream("401 unauthorized".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(res.unwrap_err().kind(), ErrorKind::Upstream);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn recovers_after_transient_overload() {
        let clock = ManualClock::new();
        let res = news_policy()
            .run("news", &clock, |attempt| async move {
                if attempt < 2 {
                    Err(BriefingError::Overloaded("busy".into()))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(res.unwrap(), 2);
    }

    #[tokio::test]
    async fn delays_are_capped() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::new(5, Duration::from_secs(15), Duration::from_secs(60));
        let _: Result<()> = policy
            .run("reddit", &clock, |_| async {
                Err(BriefingError::Overloaded("busy".into()))
            })
            .await;
        let secs: Vec<u64> = clock.sleeps().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![15, 30, 60, 60]);
    }
}
