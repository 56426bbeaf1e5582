//! Edge gate: coarse redirects for page requests, decided from the path and
//! the mere presence of a session cookie.
//!
//! Rules, first match wins:
//!
//! | path                  | session | decision                          |
//! |-----------------------|---------|-----------------------------------|
//! | API namespace         | any     | pass                              |
//! | login page            | yes     | redirect to safe `returnTo` or `/`|
//! | login page or public  | no      | pass                              |
//! | anything else         | no      | redirect to login with `returnTo` |
//! | anything else         | yes     | pass                              |
//!
//! The cookie is not decoded here; the route guard validates it.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::{AuthConfig, AuthState, cookie};

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Hand the request to the router unchanged.
    Pass,
    /// Answer with a temporary redirect to this location.
    Redirect(String),
}

/// Decide the fate of a request. Pure: same inputs, same answer.
#[must_use]
pub fn decide(
    config: &AuthConfig,
    has_session: bool,
    path: &str,
    query: Option<&str>,
) -> GateDecision {
    if config.is_api_path(path) {
        return GateDecision::Pass;
    }

    let on_login = config.is_login_path(path);

    if has_session {
        if on_login {
            let target = query
                .and_then(return_to_param)
                .filter(|target| safe_return_to(config, target))
                .unwrap_or_else(|| "/".to_string());
            return GateDecision::Redirect(target);
        }
        return GateDecision::Pass;
    }

    if on_login || config.is_public_path(path) {
        return GateDecision::Pass;
    }

    let original = match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    };
    GateDecision::Redirect(format!(
        "{}?returnTo={}",
        config.login_path,
        urlencoding::encode(&original)
    ))
}

/// Whether `target` is a same-origin relative location that is safe to
/// redirect to after login.
#[must_use]
pub fn safe_return_to(config: &AuthConfig, target: &str) -> bool {
    if !target.starts_with('/') || target.starts_with("//") {
        return false;
    }
    if target.chars().any(|c| c == '\\' || c.is_control()) {
        return false;
    }

    let path = target.split(['?', '#']).next().unwrap_or_default();
    !config.is_login_path(path)
}

/// Decoded `returnTo` value from a raw query string.
fn return_to_param(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != "returnTo" {
            return None;
        }
        // Form encoding may carry spaces as '+'.
        let value = value.replace('+', " ");
        urlencoding::decode(&value).ok().map(|v| v.into_owned())
    })
}

/// Middleware applying [`decide`] to every request.
pub async fn edge_gate(State(auth): State<Arc<AuthState>>, request: Request, next: Next) -> Response {
    let has_session = cookie::session_token(request.headers()).is_some();
    let decision = decide(
        &auth.config,
        has_session,
        request.uri().path(),
        request.uri().query(),
    );

    match decision {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Redirect(location) => {
            tracing::debug!(
                path = %request.uri().path(),
                has_session,
                location = %location,
                "Edge gate redirect"
            );
            Redirect::temporary(&location).into_response()
        }
    }
}
