use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConsoleResult;

/// The user returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_login: bool,
}

/// File-backed copy of the current user so a restarted console keeps its session.
#[derive(Debug, Clone)]
pub struct UserCache {
    path: Option<PathBuf>,
}

impl UserCache {
    pub fn at<P: Into<PathBuf>>(path: P) -> Self { Self { path: Some(path.into()) } }

    /// A cache that never persists anything.
    pub fn disabled() -> Self { Self { path: None } }

    /// `Ok(None)` when nothing is cached.
    pub fn load(&self) -> ConsoleResult<Option<CurrentUser>> {
        let Some(path) = &self.path else { return Ok(None) };
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn store(&self, user: &CurrentUser) -> ConsoleResult<()> {
        let Some(path) = &self.path else { return Ok(()) };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(user)?)?;
        debug!(target: "saintbi::identity", path = %path.display(), user = %user.username, "user cache written");
        Ok(())
    }

    pub fn clear(&self) -> ConsoleResult<()> {
        let Some(path) = &self.path else { return Ok(()) };
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
