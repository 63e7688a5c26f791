//! Backend configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_COUNTDOWN_TICK_MS: u64 = 1_000;
pub const DEFAULT_LIVE_AUCTION_LIMIT: usize = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL without a trailing slash.
    pub url: String,
    pub anon_key: String,
    pub timeouts: Timeouts,
    pub countdown_tick: Duration,
    pub live_auction_limit: usize,
}

impl BackendConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `SUPABASE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SUPABASE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `COUNTDOWN_TICK_MS`: default 1000
    /// - `LIVE_AUCTION_LIMIT`: default 12
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or the URL
    /// is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = parse_url(std::env::var("SUPABASE_URL").ok().as_deref())?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing { var: "SUPABASE_ANON_KEY" })?;

        let timeouts = Timeouts {
            request_secs: env_parse("SUPABASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("SUPABASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let tick_ms = env_parse("COUNTDOWN_TICK_MS", DEFAULT_COUNTDOWN_TICK_MS).max(1);

        Ok(Self {
            url,
            anon_key,
            timeouts,
            countdown_tick: Duration::from_millis(tick_ms),
            live_auction_limit: env_parse("LIVE_AUCTION_LIMIT", DEFAULT_LIVE_AUCTION_LIMIT),
        })
    }

    /// Config for a given project with every optional setting at its default.
    #[must_use]
    pub fn new(url: &str, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.into(),
            timeouts: Timeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            countdown_tick: Duration::from_millis(DEFAULT_COUNTDOWN_TICK_MS),
            live_auction_limit: DEFAULT_LIVE_AUCTION_LIMIT,
        }
    }
}

fn parse_url(raw: Option<&str>) -> Result<String, ConfigError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(ConfigError::Missing { var: "SUPABASE_URL" })?;
    if !(raw.starts_with("https://") || raw.starts_with("http://")) {
        return Err(ConfigError::Invalid { var: "SUPABASE_URL", reason: format!("expected http(s) URL, got '{raw}'") });
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
