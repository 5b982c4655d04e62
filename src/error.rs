//! Unified client error model.
//! One enum covers the REST calls, the local user cache and password policy checks.
//! The session coordinator never returns these; it resolves every failure into a forced logout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("api error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("password rejected: {0}")]
    PasswordPolicy(String),
    #[error("user cache error: {0}")]
    Cache(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ConsoleError {
    pub fn api<S: Into<String>>(status: u16, msg: S) -> Self { ConsoleError::Api { status, message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { ConsoleError::Config(msg.into()) }
    pub fn password<S: Into<String>>(msg: S) -> Self { ConsoleError::PasswordPolicy(msg.into()) }

    /// Stable machine-readable code, used in log fields.
    pub fn code_str(&self) -> &'static str {
        match self {
            ConsoleError::InvalidCredentials => "invalid_credentials",
            ConsoleError::Api { .. } => "api_error",
            ConsoleError::Transport(_) => "transport_error",
            ConsoleError::Config(_) => "config_error",
            ConsoleError::PasswordPolicy(_) => "password_policy",
            ConsoleError::Cache(_) => "cache_error",
            ConsoleError::Serde(_) => "serde_error",
        }
    }

    /// HTTP status that produced this error, when it came from the server.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ConsoleError::InvalidCredentials => Some(401),
            ConsoleError::Api { status, .. } => Some(*status),
            ConsoleError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the server no longer recognises the session cookie.
    pub fn is_unauthorized(&self) -> bool {
        self.http_status() == Some(401)
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
