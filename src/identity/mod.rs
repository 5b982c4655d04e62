//! Authentication state for the console: the REST client, the cached current user,
//! and the `AuthState` seam the session coordinator is driven through.
//! Keep the public surface thin and split implementation across sub-modules.

mod state;
mod user;
mod client;
mod store;

pub use state::AuthState;
pub use user::{CurrentUser, UserCache};
pub use client::{ApiClient, LoginRequest, PasswordChange};
pub use store::{AuthEvent, AuthStore};
