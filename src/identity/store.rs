use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{info, warn};

use super::client::{ApiClient, LoginRequest, PasswordChange};
use super::state::AuthState;
use super::user::{CurrentUser, UserCache};
use crate::error::{ConsoleError, ConsoleResult};

/// Password the server provisions for new accounts; never accepted as a replacement.
const DEFAULT_PASSWORD: &str = "admin";

/// Last authentication transition, published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Nothing has happened since the store was created.
    Unchanged,
    LoggedIn(CurrentUser),
    /// Local session state is gone; the front end should return to its login prompt.
    LoggedOut,
}

/// Holder of the authenticated user, backed by the REST API and a local cache.
pub struct AuthStore {
    api: ApiClient,
    cache: UserCache,
    user: RwLock<Option<CurrentUser>>,
    events: watch::Sender<AuthEvent>,
}

impl AuthStore {
    pub fn new(api: ApiClient, cache: UserCache) -> Self {
        let (events, _) = watch::channel(AuthEvent::Unchanged);
        Self { api, cache, user: RwLock::new(None), events }
    }

    /// Build a store and seed it from the cache, as a page reload would.
    pub fn restore(api: ApiClient, cache: UserCache) -> Self {
        let store = Self::new(api, cache);
        match store.cache.load() {
            Ok(Some(user)) => {
                info!(target: "saintbi::identity", user = %user.username, "restored cached session");
                *store.user.write() = Some(user);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(target: "saintbi::identity", code = e.code_str(), "ignoring unreadable user cache: {}", e);
                let _ = store.cache.clear();
            }
        }
        store
    }

    pub fn current_user(&self) -> Option<CurrentUser> { self.user.read().clone() }

    pub fn subscribe(&self) -> watch::Receiver<AuthEvent> { self.events.subscribe() }

    pub async fn login(&self, username: &str, password: &str) -> ConsoleResult<CurrentUser> {
        let req = LoginRequest { username: username.to_string(), password: password.to_string() };
        match self.api.login(&req).await {
            Ok(user) => {
                *self.user.write() = Some(user.clone());
                if let Err(e) = self.cache.store(&user) {
                    warn!(target: "saintbi::identity", code = e.code_str(), "could not persist user cache: {}", e);
                }
                info!(target: "saintbi::identity", user = %user.username, first_login = user.first_login, "login succeeded");
                self.events.send_replace(AuthEvent::LoggedIn(user.clone()));
                Ok(user)
            }
            Err(e) => {
                warn!(target: "saintbi::identity", user = username, code = e.code_str(), "login failed: {}", e);
                self.clear_local();
                Err(e)
            }
        }
    }

    /// Best-effort server logout; local state is cleared whatever the server says.
    pub async fn logout_now(&self) {
        let username = self.current_user().map(|u| u.username);
        if let Err(e) = self.api.logout().await {
            warn!(target: "saintbi::identity", code = e.code_str(), "server logout failed, clearing session locally anyway: {}", e);
        }
        self.clear_local();
        info!(target: "saintbi::identity", user = username.as_deref().unwrap_or("unknown"), "logged out");
        self.events.send_replace(AuthEvent::LoggedOut);
    }

    pub async fn extend_now(&self) -> bool {
        match self.api.extend_session().await {
            Ok(()) => {
                info!(target: "saintbi::identity", "session extended");
                true
            }
            Err(e) => {
                warn!(target: "saintbi::identity", code = e.code_str(), "session extend rejected: {}", e);
                false
            }
        }
    }

    /// Replace the provisioned password. Validated locally with the server's own rules first.
    pub async fn change_password(&self, new_password: &str, confirm_password: &str) -> ConsoleResult<()> {
        validate_new_password(new_password, confirm_password)?;
        let change = PasswordChange {
            new_password: new_password.to_string(),
            confirm_password: confirm_password.to_string(),
        };
        self.api.change_password(&change).await?;
        let updated = {
            let mut guard = self.user.write();
            if let Some(u) = guard.as_mut() {
                u.first_login = false;
            }
            guard.clone()
        };
        if let Some(u) = updated {
            if let Err(e) = self.cache.store(&u) {
                warn!(target: "saintbi::identity", code = e.code_str(), "could not persist user cache: {}", e);
            }
            info!(target: "saintbi::identity", user = %u.username, "password changed");
        }
        Ok(())
    }

    fn clear_local(&self) {
        *self.user.write() = None;
        if let Err(e) = self.cache.clear() {
            warn!(target: "saintbi::identity", code = e.code_str(), "could not remove user cache: {}", e);
        }
    }
}

pub(crate) fn validate_new_password(new_password: &str, confirm_password: &str) -> ConsoleResult<()> {
    if new_password.is_empty() || new_password != confirm_password {
        return Err(ConsoleError::password("passwords are empty or do not match"));
    }
    if new_password == DEFAULT_PASSWORD {
        return Err(ConsoleError::password("the new password cannot be the default one"));
    }
    Ok(())
}

impl AuthState for AuthStore {
    fn is_authenticated(&self) -> bool { self.user.read().is_some() }

    fn logout(&self) -> BoxFuture<'_, ()> { self.logout_now().boxed() }

    fn extend_session(&self) -> BoxFuture<'_, bool> { self.extend_now().boxed() }
}
