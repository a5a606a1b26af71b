//! Global minimum-interval throttle for the geocoding provider.
//!
//! Nominatim's usage policy allows one request per second. Every outbound
//! call acquires this limiter first; the lock is held for the
//! sleep-then-stamp sequence only, never across the HTTP call itself, so
//! concurrent callers serialize strictly in lock-acquisition order.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Build a limiter from a seconds value; non-positive disables the delay.
    pub fn from_seconds(seconds: f64) -> Self {
        let interval = if seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        };
        Self::new(interval)
    }

    /// Block until at least `min_interval` has elapsed since the previous
    /// `acquire` returned, then record the new call time. Cannot fail,
    /// only delay.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
