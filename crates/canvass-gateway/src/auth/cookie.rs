//! Cookie parsing and `Set-Cookie` rendering.

use std::fmt;
use std::time::Duration;

use axum::http::{HeaderMap, Uri, header::COOKIE};

/// Session cookie name on HTTPS. The `__Host-` prefix pins it to this origin.
pub const SECURE_SESSION_COOKIE: &str = "__Host-session";

/// Session cookie name on plain HTTP.
pub const SESSION_COOKIE: &str = "session";

/// CSRF double-submit cookie name.
pub const CSRF_COOKIE: &str = "csrf_token";

/// Read a cookie value from the request headers.
///
/// Every `Cookie` header is scanned; the first matching pair wins.
#[must_use]
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// The session token under either cookie name, if present and non-empty.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    [SECURE_SESSION_COOKIE, SESSION_COOKIE]
        .into_iter()
        .filter_map(|name| parse_cookie(headers, name))
        .find(|value| !value.is_empty())
}

/// Whether the request arrived over HTTPS, directly or via a proxy.
#[must_use]
pub fn is_secure_request(uri: &Uri, headers: &HeaderMap) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }

    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Session cookie name for the request's transport.
#[must_use]
pub const fn session_cookie_name(secure: bool) -> &'static str {
    if secure {
        SECURE_SESSION_COOKIE
    } else {
        SESSION_COOKIE
    }
}

/// `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Sent on top-level navigation from other sites.
    Lax,
    /// Never sent cross-site.
    Strict,
}

/// A `Set-Cookie` header value.
#[derive(Debug, Clone)]
pub struct SetCookie<'a> {
    name: &'a str,
    value: &'a str,
    max_age: Duration,
    http_only: bool,
    same_site: SameSite,
    secure: bool,
}

impl<'a> SetCookie<'a> {
    /// Cookie scoped to `/` with the given lifetime.
    #[must_use]
    pub const fn new(name: &'a str, value: &'a str, max_age: Duration) -> Self {
        Self {
            name,
            value,
            max_age,
            http_only: false,
            same_site: SameSite::Lax,
            secure: false,
        }
    }

    /// Hide the cookie from client script.
    #[must_use]
    pub const fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    /// Set the `SameSite` attribute.
    #[must_use]
    pub const fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set `Secure` when `secure` is true.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

impl fmt::Display for SetCookie<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path=/; Max-Age={}",
            self.name,
            self.value,
            self.max_age.as_secs()
        )?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        match self.same_site {
            SameSite::Lax => f.write_str("; SameSite=Lax")?,
            SameSite::Strict => f.write_str("; SameSite=Strict")?,
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// `Set-Cookie` value carrying a session token.
#[must_use]
pub fn session(token: &str, ttl: Duration, secure: bool) -> String {
    SetCookie::new(session_cookie_name(secure), token, ttl)
        .http_only()
        .same_site(SameSite::Lax)
        .secure(secure)
        .to_string()
}

/// `Set-Cookie` values that expire both session cookie names.
#[must_use]
pub fn clear_session(secure: bool) -> [String; 2] {
    [SECURE_SESSION_COOKIE, SESSION_COOKIE].map(|name| {
        SetCookie::new(name, "", Duration::ZERO)
            .http_only()
            .same_site(SameSite::Lax)
            // The __Host- prefix is only accepted together with Secure.
            .secure(secure || name == SECURE_SESSION_COOKIE)
            .to_string()
    })
}
