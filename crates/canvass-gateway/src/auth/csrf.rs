//! Double-submit CSRF protection.
//!
//! A random token is stored in a script-readable cookie. Client script echoes
//! it in the `X-CSRF-Token` header; unsafe requests are refused unless the two
//! match.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use super::cookie::{self, CSRF_COOKIE, SameSite, SetCookie};
use super::{AuthError, AuthState};

/// Request header carrying the echoed token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Token length in bytes before hex encoding.
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh token from the OS random source.
#[must_use]
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `Set-Cookie` value for a CSRF token. Readable by script.
#[must_use]
pub fn cookie(token: &str, ttl: Duration, secure: bool) -> String {
    SetCookie::new(CSRF_COOKIE, token, ttl)
        .same_site(SameSite::Strict)
        .secure(secure)
        .to_string()
}

/// `Set-Cookie` value that expires the CSRF cookie.
#[must_use]
pub fn clear(secure: bool) -> String {
    cookie("", Duration::ZERO, secure)
}

/// Whether the request may proceed.
///
/// Safe methods always pass. Anything else needs a non-empty cookie token
/// equal to the header token.
#[must_use]
pub fn verify(method: &Method, headers: &HeaderMap) -> bool {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return true;
    }

    let Some(cookie_token) = cookie::parse_cookie(headers, CSRF_COOKIE) else {
        return false;
    };
    let Some(header_token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    !cookie_token.is_empty() && bool::from(cookie_token.as_bytes().ct_eq(header_token.as_bytes()))
}

/// Middleware refusing unsafe requests that fail [`verify`].
pub async fn protect(State(auth): State<Arc<AuthState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if auth.config.is_csrf_exempt(path) || verify(request.method(), request.headers()) {
        return next.run(request).await;
    }

    tracing::warn!(method = %request.method(), path = %path, "Rejected request without valid CSRF token");
    AuthError::InvalidCsrf.into_response()
}
