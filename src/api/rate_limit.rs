//! Rate limiting for public and claim endpoints.
//!
//! Fixed-window counters keyed by caller (IP or tenant). The table lives in
//! process memory; a background task sweeps expired windows.
//!
//! # Configuration
//!
//! - `KEYRELAY_AVAILABILITY_PER_MINUTE`: availability checks per IP (default: 10)
//! - `KEYRELAY_CLAIMS_PER_HOUR`: subdomain claims per tenant (default: 5)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window rate limiter.
///
/// Each key gets `max_requests` per `window`; the count resets when the
/// window elapses.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    scope: &'static str,
    windows: Arc<Mutex<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(scope: &'static str, max_requests: u32, window: Duration) -> Self {
        Self { scope, windows: Arc::new(Mutex::new(HashMap::new())), max_requests, window }
    }

    /// Count one request for `key`.
    ///
    /// Returns `Err(retry_after_secs)` when the window is exhausted.
    pub async fn check_rate_limit(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            debug!(scope = self.scope, key = %key, used = entry.count, "Rate limit check passed");
            return Ok(());
        }

        let remaining = self.window.saturating_sub(now.duration_since(entry.started));
        let retry_after = remaining.as_secs().max(1);
        warn!(scope = self.scope, key = %key, retry_after_seconds = retry_after, "Rate limit exceeded");
        metrics::record_rate_limited(self.scope);
        Err(retry_after)
    }

    /// Like [`Self::check_rate_limit`] but as a gateway error
    pub async fn check(&self, key: &str) -> Result<(), GatewayError> {
        self.check_rate_limit(key).await.map_err(|retry_after| {
            GatewayError::rate_limit(format!("Too many {} requests", self.scope), Some(retry_after))
        })
    }

    /// Drop windows that have fully elapsed
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < self.window);
        before - windows.len()
    }

    /// Run [`Self::sweep`] every `interval` until the runtime shuts down
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!(scope = limiter.scope, removed, "Swept rate limit windows");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_within_limit() {
        let limiter = RateLimiter::new("test", 5, Duration::from_secs(3600));
        for i in 0..5 {
            assert!(limiter.check_rate_limit("tenant-a").await.is_ok(), "Request {} should succeed", i + 1);
        }
    }

    #[tokio::test]
    async fn blocks_over_limit() {
        let limiter = RateLimiter::new("test", 3, Duration::from_secs(3600));
        for _ in 0..3 {
            limiter.check_rate_limit("tenant-b").await.unwrap();
        }
        let retry_after = limiter.check_rate_limit("tenant-b").await.unwrap_err();
        assert!(retry_after > 0 && retry_after <= 3600);
    }

    #[tokio::test]
    async fn isolates_keys() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(3600));
        limiter.check_rate_limit("a").await.unwrap();
        assert!(limiter.check_rate_limit("a").await.is_err());
        assert!(limiter.check_rate_limit("b").await.is_ok());
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = RateLimiter::new("test", 1, Duration::from_millis(50));
        limiter.check_rate_limit("c").await.unwrap();
        assert!(limiter.check_rate_limit("c").await.is_err());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.check_rate_limit("c").await.is_ok());
    }

    #[tokio::test]
    async fn sweep_removes_expired_windows() {
        let limiter = RateLimiter::new("test", 1, Duration::from_millis(20));
        limiter.check_rate_limit("d").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(limiter.sweep().await, 1);
    }

    #[tokio::test]
    async fn gateway_error_carries_retry_after() {
        let limiter = RateLimiter::new("claim", 0, Duration::from_secs(60));
        let err = limiter.check("e").await.unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert!(matches!(err, GatewayError::RateLimit { retry_after: Some(_), .. }));
    }
}
