pub mod client_ip;
pub mod connection;
pub mod dispatcher;
pub mod rate_limit;
pub mod submit;

use std::sync::Arc;
use std::time::Duration;

use thankmap_db::Database;

use crate::dispatcher::Dispatcher;
use crate::rate_limit::RateLimiter;

/// Tunables of the gateway, filled from the server config.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Prefix of share links, e.g. `https://thankmap.com`.
    pub share_base_url: String,
    /// Full width, in degrees, of the random offset applied to live blinks.
    pub jitter_degrees: f64,
    /// Cap on rows returned for history and viewport queries.
    pub max_results: u32,
    /// Minimum time between two accepted posts from the same IP.
    pub cooldown: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            share_base_url: "https://thankmap.com".into(),
            jitter_degrees: 0.1,
            max_results: 100,
            cooldown: Duration::from_secs(20),
        }
    }
}

/// Everything a connection needs, cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub limiter: Arc<RateLimiter>,
    pub settings: Arc<GatewaySettings>,
}

impl Gateway {
    pub fn new(db: Arc<Database>, settings: GatewaySettings) -> Self {
        Self {
            db,
            dispatcher: Dispatcher::new(),
            limiter: Arc::new(RateLimiter::new(settings.cooldown)),
            settings: Arc::new(settings),
        }
    }
}
