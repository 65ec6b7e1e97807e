//! Per-host single-token rate limiter.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Gates requests to at most `rate_per_second` per host, independently per
/// host. Unknown hosts are ready immediately.
pub struct RateLimiter {
    rate_per_second: f64,
    last_issued: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(rate_per_second: f64) -> Result<Self, crate::CrawlerError> {
        if !(rate_per_second > 0.0) {
            return Err(crate::CrawlerError::InvalidConfig {
                field: "rate_limit".to_string(),
                reason: format!("must be positive, got {}", rate_per_second),
            });
        }
        Ok(Self {
            rate_per_second,
            last_issued: Mutex::new(HashMap::new()),
        })
    }

    /// Blocks until a request to `host` may proceed, then records the issue
    /// time. Concurrent callers for the same host serialize; calls for
    /// distinct hosts never block each other.
    pub async fn acquire(&self, host: &str) {
        let min_interval = Duration::from_secs_f64(1.0 / self.rate_per_second);

        let wait = {
            let mut guard = self.last_issued.lock().await;
            let now = Instant::now();
            let wait = match guard.get(host) {
                Some(&last) => {
                    let elapsed = now.duration_since(last);
                    min_interval.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            };
            guard.insert(host.to_string(), now + wait);
            wait
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
