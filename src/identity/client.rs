use reqwest::{StatusCode, Url};
use serde::Serialize;
use tracing::debug;

use super::user::CurrentUser;
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub new_password: String,
    pub confirm_password: String,
}

/// Cookie-carrying client for the SAINT BI auth endpoints.
///
/// The session id lives only in the client's cookie jar, the same way the
/// browser holds the `session-name` cookie.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: Url) -> ConsoleResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()?;
        Ok(Self { base, client })
    }

    pub fn parse(base: &str) -> ConsoleResult<Self> {
        let url = Url::parse(base).map_err(|e| ConsoleError::config(format!("invalid base URL '{}': {}", base, e)))?;
        Self::new(url)
    }

    fn endpoint(&self, path: &str) -> ConsoleResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ConsoleError::config(format!("cannot build {} from {}: {}", path, self.base, e)))
    }

    // POST /api/login
    pub async fn login(&self, req: &LoginRequest) -> ConsoleResult<CurrentUser> {
        let url = self.endpoint("/api/login")?;
        let resp = self.client.post(url).json(req).send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ConsoleError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(error_from_response(resp).await);
        }
        let user: CurrentUser = resp.json().await?;
        debug!(target: "saintbi::api", user = %user.username, id = user.id, "login accepted");
        Ok(user)
    }

    // POST /api/logout
    pub async fn logout(&self) -> ConsoleResult<()> {
        let url = self.endpoint("/api/logout")?;
        let resp = self.client.post(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }

    // POST /api/session/extend
    pub async fn extend_session(&self) -> ConsoleResult<()> {
        let url = self.endpoint("/api/session/extend")?;
        let resp = self.client.post(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }

    // POST /api/force-password-change
    pub async fn change_password(&self, change: &PasswordChange) -> ConsoleResult<()> {
        let url = self.endpoint("/api/force-password-change")?;
        let resp = self.client.post(url).json(change).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }
}

/// Server errors come back as `{"error": "<message>"}`; fall back to the status text.
async fn error_from_response(resp: reqwest::Response) -> ConsoleError {
    let status = resp.status();
    let val: serde_json::Value = resp.json().await.unwrap_or(serde_json::json!({}));
    let message = val
        .get("error")
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    ConsoleError::api(status.as_u16(), message)
}
