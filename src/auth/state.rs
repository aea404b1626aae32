//! Authentication state trait and macro.

use crate::session::SessionManager;

/// Trait for state types that can verify bearer tokens.
pub trait HasAuthBackend {
    fn sessions(&self) -> &SessionManager;
}

/// Implement `HasAuthBackend` for a state struct with a
/// `sessions: SessionManager` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub sessions: SessionManager,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn sessions(&self) -> &$crate::session::SessionManager {
                &self.sessions
            }
        }
    };
}
