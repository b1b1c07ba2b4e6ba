//! Session cookie authentication.
//!
//! The session is a signed JWT in an HttpOnly cookie. Extractors resolve it
//! per request (rotating the backend access token when it has expired) and a
//! response middleware appends the re-signed cookie.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;

pub use cookie::{
    OAUTH_CALLBACK_COOKIE_NAME, OAUTH_COOKIE_MAX_AGE_SECS, OAUTH_STATE_COOKIE_NAME,
    SESSION_COOKIE_NAME, clear_cookie, get_cookie, oauth_cookie, session_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    Auth, GuardedSession, NEW_SESSION_COOKIE, OptionalAuth, add_session_cookie,
    stash_session_cookie,
};
pub use ip::{ClientIpHeader, extract_client_ip};
pub use state::HasSessionManager;
