//! Session cookie contract
//!
//! One HTTP-only cookie named `jwt` carries the session token. `Secure`
//! is driven by the deployment environment, `SameSite=Strict` always.
//! Logout and account deletion expire it with `Max-Age=0`.

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};

use crate::auth::jwt::SESSION_TTL_SECONDS;

pub const SESSION_COOKIE: &str = "jwt";

/// `Set-Cookie` value installing a session token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={SESSION_TTL_SECONDS}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value expiring the session immediately.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Short-lived auxiliary cookie (phone-update flow).
pub fn short_lived_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Read one cookie out of a `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for cookie in cookies.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Append a `Set-Cookie` header, skipping values that fail to encode.
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to encode Set-Cookie header");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc", true);
        assert!(cookie.starts_with("jwt=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains(&format!("Max-Age={SESSION_TTL_SECONDS}")));
    }

    #[test]
    fn dev_cookie_is_not_secure() {
        assert!(!session_cookie("abc", false).contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false);
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.starts_with("jwt=;"));
    }

    #[test]
    fn cookie_value_parses_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; jwt=tok123; other=1"),
        );
        assert_eq!(cookie_value(&headers, "jwt").as_deref(), Some("tok123"));
        assert_eq!(cookie_value(&headers, "newPhone"), None);
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(cookie_value(&headers, "jwt"), None);
    }

    #[test]
    fn prefix_name_does_not_match() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt2=evil"));
        assert_eq!(cookie_value(&headers, "jwt"), None);
    }
}
