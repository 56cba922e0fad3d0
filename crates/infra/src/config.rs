//! Process configuration loaded from environment variables.
//!
//! Read once at startup; nothing here is persisted.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use thiserror::Error;

use crate::rate_limit::{RateLimiterConfig, WindowStrategy, DEFAULT_DENIAL_MESSAGE};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub bind_addr: SocketAddr,

    /// Rate-limit window (default: 15 minutes).
    pub window_duration: Duration,

    /// Requests admitted per window and client (default: 15).
    pub max_requests: NonZeroU32,

    /// Body message of a 429 response.
    pub denial_message: String,

    /// Window strategy: "fixed" (default) or "sliding".
    pub strategy: WindowStrategy,

    /// How often idle rate-limit keys are purged (default: 60s).
    pub sweep_interval: Duration,

    /// Allowed cross-origin callers (comma-separated, default: "*").
    pub allowed_origins: Vec<String>,

    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers
    /// (default: false).
    pub trust_proxy_headers: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            window_duration: Duration::from_secs(15 * 60),
            max_requests: RateLimiterConfig::default().max_requests,
            denial_message: DEFAULT_DENIAL_MESSAGE.to_string(),
            strategy: WindowStrategy::FixedReset,
            sweep_interval: Duration::from_secs(60),
            allowed_origins: vec!["*".to_string()],
            trust_proxy_headers: false,
        }
    }
}

impl GovernanceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", format!("{e}")))?,
            None => defaults.bind_addr,
        };

        let window_duration = match parse_u64(&lookup, "RATE_LIMIT_WINDOW_SECS")? {
            Some(0) => {
                return Err(ConfigError::invalid("RATE_LIMIT_WINDOW_SECS", "must be greater than 0"));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.window_duration,
        };

        let max_requests = match parse_u64(&lookup, "RATE_LIMIT_MAX_REQUESTS")? {
            Some(n) => u32::try_from(n)
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| {
                    ConfigError::invalid("RATE_LIMIT_MAX_REQUESTS", "must be between 1 and 4294967295")
                })?,
            None => defaults.max_requests,
        };

        let denial_message = lookup("RATE_LIMIT_MESSAGE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.denial_message);

        let strategy = match lookup("RATE_LIMIT_STRATEGY") {
            Some(v) => v
                .parse()
                .map_err(|e: String| ConfigError::invalid("RATE_LIMIT_STRATEGY", e))?,
            None => defaults.strategy,
        };

        let sweep_interval = match parse_u64(&lookup, "RATE_LIMIT_SWEEP_SECS")? {
            Some(0) => {
                return Err(ConfigError::invalid("RATE_LIMIT_SWEEP_SECS", "must be greater than 0"));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.sweep_interval,
        };

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.allowed_origins);

        let trust_proxy_headers = match lookup("TRUST_PROXY_HEADERS") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                ConfigError::invalid("TRUST_PROXY_HEADERS", format!("'{v}' is not a boolean"))
            })?,
            None => defaults.trust_proxy_headers,
        };

        Ok(Self {
            bind_addr,
            window_duration,
            max_requests,
            denial_message,
            strategy,
            sweep_interval,
            allowed_origins,
            trust_proxy_headers,
        })
    }

    /// Limiter settings for the login route group.
    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::new(self.max_requests, self.window_duration)
            .with_denial_message(self.denial_message.clone())
            .with_strategy(self.strategy)
    }

    /// True when any origin may call the service.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_u64<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid(var, format!("{e}")))
        })
        .transpose()
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
