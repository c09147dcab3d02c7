//! Admission control for callers of the analysis pipeline.
//!
//! Two independent gates, composable on the same entry point: a
//! fixed-window rate limiter that rejects, and a counter-based throttle
//! that delays. Per-key state lives behind a mutex so that concurrent
//! calls from the same client cannot slip past a limit; the throttle's
//! delay always happens outside the lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::warn;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use crate::models::{RateLimitConfig, ThrottleConfig};

/// Errors that can occur during admission checks
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("rate limit exceeded")]
    ExceededLimit,
}

/// Per-client fixed window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window rate limiter keyed by client identity.
///
/// Window reset is lazy: it is evaluated only on the client's next call,
/// so a client that goes silent keeps its stale window until then.
/// Entries for inactive clients accumulate for the lifetime of the
/// process; [`RateLimiter::reset`] drops a single client's state.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check whether a request from `key` is admitted.
    ///
    /// Starts a fresh window (count 1) when none exists or the current
    /// one has expired; otherwise increments the window counter and
    /// rejects once it exceeds the configured maximum.
    pub fn check(&self, key: &str) -> Result<(), AdmissionError> {
        let now = Instant::now();
        let window_len = Duration::from_secs(self.config.window_seconds);

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = match windows.get_mut(key) {
            Some(window) if now.duration_since(window.started) <= window_len => window,
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        started: now,
                        count: 1,
                    },
                );
                return Ok(());
            }
        };

        window.count = window.count.saturating_add(1);
        if window.count > self.config.max_requests {
            counter!("admission_rate_limited_total", 1);
            return Err(AdmissionError::ExceededLimit);
        }
        Ok(())
    }

    /// Whether a request from `key` would be rejected right now. This is
    /// an admission check like [`check`](Self::check) and consumes a slot
    /// from the window.
    pub fn rate_limited(&self, key: &str) -> bool {
        self.check(key).is_err()
    }

    /// Forget all state for `key`.
    pub fn reset(&self, key: &str) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// Counter-based throttle keyed by client identity.
///
/// Exceeding the limit delays the call instead of rejecting it: the
/// caller is serviced after `slowdown_seconds`, and the counter resets
/// to zero. There is no time window; only the running count matters.
pub struct Throttle {
    counters: Mutex<HashMap<String, u32>>,
    config: ThrottleConfig,
}

impl Throttle {
    /// Create a new throttle.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Admit a request from `key`, delaying it once the per-key counter
    /// exceeds the limit. Only the calling request path is stalled.
    pub async fn acquire(&self, key: &str) {
        let exceeded = {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            let count = counters.entry(key.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count > self.config.max_requests
        };

        if exceeded {
            counter!("admission_throttled_total", 1);
            warn!(
                "throttling client {} for {}s",
                key, self.config.slowdown_seconds
            );
            tokio::time::sleep(Duration::from_secs(self.config.slowdown_seconds)).await;
            self.counters
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key.to_string(), 0);
        }
    }
}

/// Both admission gates applied to one entry point: the rate limiter is
/// evaluated first, the throttle second.
pub struct AdmissionControl {
    limiter: RateLimiter,
    throttle: Throttle,
}

impl AdmissionControl {
    /// Create a composed admission gate.
    pub fn new(rate_limit: RateLimitConfig, throttle: ThrottleConfig) -> Self {
        Self {
            limiter: RateLimiter::new(rate_limit),
            throttle: Throttle::new(throttle),
        }
    }

    /// Admit a request from `key`, rejecting it when the rate limit is
    /// exhausted and delaying it when the throttle count is exceeded.
    pub async fn admit(&self, key: &str) -> Result<(), AdmissionError> {
        self.limiter.check(key)?;
        self.throttle.acquire(key).await;
        Ok(())
    }

    /// The rate limiter gate.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(max_requests: u32, window_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window_seconds,
        })
    }

    #[test]
    fn sixth_call_in_window_is_rejected() {
        let limiter = limiter(5, 60);
        for _ in 0..5 {
            assert!(limiter.check("10.1.1.1").is_ok());
        }
        assert_eq!(limiter.check("10.1.1.1"), Err(AdmissionError::ExceededLimit));
    }

    #[test]
    fn keys_are_limited_independently() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("10.1.1.1").is_ok());
        assert!(limiter.check("10.1.1.2").is_ok());
        assert!(limiter.check("10.1.1.1").is_err());
    }

    #[test]
    fn reset_drops_client_state() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("10.1.1.1").is_ok());
        assert!(limiter.check("10.1.1.1").is_err());
        limiter.reset("10.1.1.1");
        assert!(limiter.check("10.1.1.1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_expiry_regardless_of_prior_count() {
        let limiter = limiter(2, 60);
        assert!(limiter.check("10.1.1.1").is_ok());
        assert!(limiter.check("10.1.1.1").is_ok());
        assert!(limiter.check("10.1.1.1").is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("10.1.1.1").is_ok());
    }

    #[tokio::test]
    async fn concurrent_same_key_calls_never_exceed_limit() {
        let limiter = Arc::new(limiter(5, 60));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.check("10.1.1.1").is_ok() }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_delays_excess_call_and_resets_counter() {
        let throttle = Throttle::new(ThrottleConfig {
            max_requests: 10,
            slowdown_seconds: 5,
        });

        let start = Instant::now();
        for _ in 0..10 {
            throttle.acquire("10.1.1.1").await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // 11th call crosses the limit and is stalled
        throttle.acquire("10.1.1.1").await;
        assert!(start.elapsed() >= Duration::from_secs(5));

        // counter was reset, so the next call goes straight through
        let after_delay = Instant::now();
        throttle.acquire("10.1.1.1").await;
        assert_eq!(after_delay.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_rejects_before_throttle_delays() {
        let control = AdmissionControl::new(
            RateLimitConfig {
                max_requests: 1,
                window_seconds: 60,
            },
            ThrottleConfig {
                max_requests: 1,
                slowdown_seconds: 5,
            },
        );

        assert!(control.admit("10.1.1.1").await.is_ok());

        // the second call is rejected immediately: no throttle delay is
        // observed because the limiter runs first
        let start = Instant::now();
        assert_eq!(
            control.admit("10.1.1.1").await,
            Err(AdmissionError::ExceededLimit)
        );
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
