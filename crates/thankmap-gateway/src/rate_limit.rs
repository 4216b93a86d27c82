use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::submit::Rejection;

/// Per-IP cooldown between accepted posts.
///
/// State is in-memory only and starts empty on every restart. Entries older
/// than the cooldown carry no information and are dropped by [`sweep`].
///
/// [`sweep`]: RateLimiter::sweep
pub struct RateLimiter {
    cooldown: Duration,
    last_post: Mutex<HashMap<IpAddr, Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_post: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a post from `ip` at `now`, or reject it with the time left
    /// until the cooldown expires. Only accepted posts reset the window.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Result<(), Rejection> {
        let mut last_post = self.last_post.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = last_post.get(&ip) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.cooldown {
                return Err(Rejection::RateLimited {
                    retry_after: self.cooldown - elapsed,
                });
            }
        }

        last_post.insert(ip, now);
        Ok(())
    }

    /// Drop entries whose cooldown has expired. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut last_post = self.last_post.lock().unwrap_or_else(PoisonError::into_inner);
        let before = last_post.len();
        last_post.retain(|_, last| now.saturating_duration_since(*last) < self.cooldown);
        before - last_post.len()
    }

    /// Number of IPs currently inside their cooldown window (or not yet swept).
    pub fn tracked(&self) -> usize {
        self.last_post.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Background task that keeps the cooldown map from growing without bound.
pub async fn run_sweep_loop(limiter: Arc<RateLimiter>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        let removed = limiter.sweep(Instant::now());
        if removed > 0 {
            debug!("Rate limiter: swept {} expired entries, {} tracked", removed, limiter.tracked());
        }
    }
}
