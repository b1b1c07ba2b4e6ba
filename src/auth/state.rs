//! Authentication state trait and macro.

use crate::session::SessionManager;

/// Trait for state types that can resolve sessions.
pub trait HasSessionManager {
    fn sessions(&self) -> &SessionManager;
}

/// Macro to implement `HasSessionManager` for state structs with the standard field.
///
/// The struct must have a `sessions: Arc<SessionManager>` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_session_manager;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub sessions: Arc<SessionManager>,
///     // ... other fields
/// }
///
/// impl_has_session_manager!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_session_manager {
    ($state_type:ty) => {
        impl $crate::auth::HasSessionManager for $state_type {
            fn sessions(&self) -> &$crate::session::SessionManager {
                &self.sessions
            }
        }
    };
}
