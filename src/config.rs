use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{ConsoleError, ConsoleResult};

/// Total client-side session lifetime. Must equal the server cookie MaxAge (1200 s).
pub const SESSION_DURATION_MS: u64 = 20 * 60 * 1000;
/// How long before expiry the warning is shown.
pub const WARNING_LEAD_MS: u64 = 2 * 60 * 1000;

pub const ENV_API_URL: &str = "SAINTBI_API_URL";
pub const ENV_USER_CACHE: &str = "SAINTBI_USER_CACHE";

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_USER_CACHE: &str = ".saintbi/user.json";

/// Console runtime settings. Session timing is not part of this; it is fixed at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// Base URL of the SAINT BI API, without the `/api` suffix.
    pub api_url: String,
    /// File holding the last logged-in user between runs.
    pub user_cache: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_cache: PathBuf::from(DEFAULT_USER_CACHE),
        }
    }
}

impl ConsoleConfig {
    /// Read settings from `SAINTBI_*` environment variables, falling back to defaults.
    pub fn from_env() -> ConsoleResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ConsoleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(url) = lookup(ENV_API_URL).filter(|s| !s.trim().is_empty()) {
            cfg.api_url = url.trim().to_string();
        }
        if let Some(path) = lookup(ENV_USER_CACHE).filter(|s| !s.trim().is_empty()) {
            cfg.user_cache = PathBuf::from(path.trim());
        }
        cfg.base_url()?;
        Ok(cfg)
    }

    pub fn base_url(&self) -> ConsoleResult<Url> {
        Url::parse(&self.api_url)
            .map_err(|e| ConsoleError::config(format!("invalid {} '{}': {}", ENV_API_URL, self.api_url, e)))
    }
}

/// Total session duration and warning lead time, mirrored from the server session TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub total: Duration,
    pub warning_lead: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::from_millis(SESSION_DURATION_MS, WARNING_LEAD_MS)
    }
}

impl SessionTiming {
    pub const fn from_millis(total_ms: u64, warning_lead_ms: u64) -> Self {
        Self { total: Duration::from_millis(total_ms), warning_lead: Duration::from_millis(warning_lead_ms) }
    }

    /// Delay from cycle start to the warning. Zero when the lead is not shorter than the total.
    pub fn warning_delay(&self) -> Duration {
        self.total.saturating_sub(self.warning_lead)
    }

    /// Countdown start value shown on warning entry.
    pub fn warning_seconds(&self) -> u64 {
        self.warning_lead.as_secs()
    }

    /// `warning_lead >= total`: the warning fires immediately on every cycle.
    pub fn is_degenerate(&self) -> bool {
        self.warning_lead >= self.total
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
