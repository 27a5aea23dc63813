// src/pacing/rate_limiter.rs
//! Admission gate bounding how many upstream calls may start per time window.
//!
//! Keeps a log of the start instants inside the current window. A caller that
//! finds the window full sleeps until the oldest entry ages out. The log sits
//! behind a fair async mutex held across that sleep, so callers are admitted
//! strictly in arrival order and none is ever dropped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::sync::Mutex;
use tracing::debug;

use super::SharedClock;

pub struct RateLimiter {
    name: &'static str,
    permits: usize,
    window: Duration,
    clock: SharedClock,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `permits` calls per `window`. A zero permit count is treated as one.
    pub fn new(name: &'static str, permits: u32, window: Duration, clock: SharedClock) -> Self {
        let permits = permits.max(1) as usize;
        Self {
            name,
            permits,
            window,
            clock,
            issued: Mutex::new(VecDeque::with_capacity(permits)),
        }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call may start, then record it.
    pub async fn acquire(&self) {
        let mut issued = self.issued.lock().await;
        let started = self.clock.now();
        loop {
            let now = self.clock.now();
            while let Some(&oldest) = issued.front() {
                if now.duration_since(oldest) >= self.window {
                    issued.pop_front();
                } else {
                    break;
                }
            }

            if issued.len() < self.permits {
                issued.push_back(now);
                let waited = now.duration_since(started);
                if !waited.is_zero() {
                    histogram!("briefing_rate_limit_wait_ms", "source" => self.name)
                        .record(waited.as_secs_f64() * 1_000.0);
                }
                return;
            }

            let wait = match issued.front() {
                Some(&oldest) => self.window.saturating_sub(now.duration_since(oldest)),
                None => Duration::ZERO,
            };
            debug!(target: "ingest", limiter = self.name, wait_ms = wait.as_millis() as u64, "rate limited");
            self.clock.sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::{Clock, ManualClock};
    use std::sync::Arc;

    async fn starts(limiter: &RateLimiter, clock: &ManualClock, n: usize) -> Vec<Duration> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            limiter.acquire().await;
            out.push(clock.elapsed());
        }
        out
    }

    #[tokio::test]
    async fn burst_within_permits_does_not_wait() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new("news", 5, Duration::from_secs(1), clock.clone());
        let t = starts(&limiter, &clock, 5).await;
        assert!(t.iter().all(|d| d.is_zero()));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn sixth_call_waits_for_the_window() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new("news", 5, Duration::from_secs(1), clock.clone());
        let t = starts(&limiter, &clock, 6).await;
        assert_eq!(t[5], Duration::from_secs(1));
    }

    #[tokio::test]
    async fn sliding_window_bound_holds_for_many_calls() {
        let clock = Arc::new(ManualClock::new());
        let window = Duration::from_secs(15);
        let limiter = RateLimiter::new("reddit", 1, window, clock.clone());

        // Interleave some caller-side work so starts are not perfectly aligned.
        let mut t = Vec::new();
        for i in 0..6u64 {
            limiter.acquire().await;
            t.push(clock.elapsed());
            clock.advance(Duration::from_secs(i * 3));
        }

        for (i, a) in t.iter().enumerate() {
            let in_window = t[i..].iter().filter(|b| **b - *a < window).count();
            assert!(in_window <= 1, "window starting at {a:?} holds {in_window} calls");
        }
    }

    #[tokio::test]
    async fn elapsed_window_frees_permits_without_sleeping() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new("news", 2, Duration::from_secs(1), clock.clone());
        limiter.acquire().await;
        limiter.acquire().await;
        clock.advance(Duration::from_secs(2));
        let before = clock.now();
        limiter.acquire().await;
        assert_eq!(clock.now(), before);
        assert!(clock.sleeps().is_empty());
    }
}
