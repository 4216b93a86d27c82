use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use thankmap_gateway::GatewaySettings;

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub trust_proxy: bool,
    pub gateway: GatewaySettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GatewaySettings::default();

        let port_key = if lookup("THANKMAP_PORT").is_some() { "THANKMAP_PORT" } else { "PORT" };
        let port: u16 = parse_or(&lookup, port_key, 3001)?;

        let cooldown_secs: u64 = parse_or(&lookup, "THANKMAP_COOLDOWN_SECS", defaults.cooldown.as_secs())?;
        let jitter_degrees: f64 = parse_or(&lookup, "THANKMAP_JITTER_DEGREES", defaults.jitter_degrees)?;
        if !jitter_degrees.is_finite() || jitter_degrees < 0.0 {
            anyhow::bail!("THANKMAP_JITTER_DEGREES must be a non-negative number");
        }

        Ok(Self {
            host: lookup("THANKMAP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: lookup("THANKMAP_DB_PATH").unwrap_or_else(|| "thankmap.db".into()).into(),
            trust_proxy: parse_or(&lookup, "THANKMAP_TRUST_PROXY", false)?,
            gateway: GatewaySettings {
                share_base_url: lookup("THANKMAP_SHARE_BASE_URL").unwrap_or(defaults.share_base_url),
                jitter_degrees,
                max_results: parse_or(&lookup, "THANKMAP_MAX_RESULTS", defaults.max_results)?,
                cooldown: Duration::from_secs(cooldown_secs),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
