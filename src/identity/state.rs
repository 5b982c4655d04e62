use std::sync::Arc;

use futures_util::future::BoxFuture;

/// What the session coordinator needs from the authentication holder.
///
/// The coordinator only reads `is_authenticated` and calls the two operations;
/// any change to the authenticated flag happens inside them.
pub trait AuthState: Send + Sync + 'static {
    fn is_authenticated(&self) -> bool;

    /// End the session. Always settles: local state is cleared even when the
    /// server cannot be reached.
    fn logout(&self) -> BoxFuture<'_, ()>;

    /// Ask the server to extend the session. `false` means the session is
    /// unrecoverable (rejected, expired, or unreachable).
    fn extend_session(&self) -> BoxFuture<'_, bool>;
}

impl<T: AuthState + ?Sized> AuthState for Arc<T> {
    fn is_authenticated(&self) -> bool { (**self).is_authenticated() }
    fn logout(&self) -> BoxFuture<'_, ()> { (**self).logout() }
    fn extend_session(&self) -> BoxFuture<'_, bool> { (**self).extend_session() }
}
