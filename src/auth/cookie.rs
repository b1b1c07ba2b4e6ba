//! Cookie parsing and construction.

use axum::http::header;

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE_NAME: &str = "session_token";

/// Cookie carrying the CSRF state of an in-flight OAuth sign-in.
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

/// Cookie carrying the callback URL of an in-flight OAuth sign-in.
pub const OAUTH_CALLBACK_COOKIE_NAME: &str = "oauth_callback";

/// Lifetime of the OAuth state cookies: 10 minutes.
pub const OAUTH_COOKIE_MAX_AGE_SECS: u64 = 10 * 60;

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

/// `Set-Cookie` value for the session token.
pub fn session_cookie(token: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        token,
        max_age,
        secure_suffix(secure)
    )
}

/// `Set-Cookie` value for a short-lived OAuth cookie. The value must already
/// be cookie-safe.
pub fn oauth_cookie(name: &str, value: &str, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/api/auth; Max-Age={}{}",
        name,
        value,
        OAUTH_COOKIE_MAX_AGE_SECS,
        secure_suffix(secure)
    )
}

/// `Set-Cookie` value removing the named cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let path = if name == SESSION_COOKIE_NAME {
        "/"
    } else {
        "/api/auth"
    };
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path={}; Max-Age=0{}",
        name,
        path,
        secure_suffix(secure)
    )
}
