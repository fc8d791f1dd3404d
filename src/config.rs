//! Configuration management for the worker proxy
//!
//! Configuration is loaded from environment variables. The routes table comes from
//! `ROUTES_CONFIG` (inline JSON) or `ROUTES_CONFIG_FILE` (path to the same JSON).

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::registry::RouteConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Shared secret callers present as a bearer credential
    pub proxy_auth_token: String,

    /// Alias -> provider routes
    pub routes: Vec<RouteConfig>,

    /// Total wall-clock budget for a non-streaming call (retry included)
    pub request_timeout: Duration,
    /// Maximum silence between upstream chunks on a streaming call
    pub stream_idle_timeout: Duration,
    /// TCP/TLS connect timeout for upstream connections
    pub connect_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let proxy_auth_token = lookup("PROXY_AUTH_TOKEN")
            .filter(|t| !t.is_empty())
            .context("PROXY_AUTH_TOKEN must be set")?;

        Ok(Self {
            host: lookup("WORKER_PROXY_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("WORKER_PROXY_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("Invalid WORKER_PROXY_PORT")?,

            proxy_auth_token,

            routes: load_routes(&lookup)?,

            request_timeout: seconds(&lookup, "UPSTREAM_TIMEOUT_SECONDS", 120)?,
            stream_idle_timeout: seconds(&lookup, "STREAM_IDLE_TIMEOUT_SECONDS", 60)?,
            connect_timeout: seconds(&lookup, "UPSTREAM_CONNECT_TIMEOUT_SECONDS", 10)?,
        })
    }

    /// Socket address the server listens on
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid WORKER_PROXY_HOST {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = match lookup(key) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid {}", key))?,
        None => default,
    };
    if secs == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(Duration::from_secs(secs))
}

fn load_routes<F>(lookup: &F) -> Result<Vec<RouteConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let (raw, source) = match (lookup("ROUTES_CONFIG"), lookup("ROUTES_CONFIG_FILE")) {
        (Some(inline), _) => (inline, "ROUTES_CONFIG".to_string()),
        (None, Some(path)) => (
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read ROUTES_CONFIG_FILE {}", path))?,
            path,
        ),
        (None, None) => bail!("ROUTES_CONFIG or ROUTES_CONFIG_FILE must be set"),
    };

    let routes: Vec<RouteConfig> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid routes JSON in {}", source))?;
    if routes.is_empty() {
        bail!("Routes configuration in {} contains no routes", source);
    }
    Ok(routes)
}
