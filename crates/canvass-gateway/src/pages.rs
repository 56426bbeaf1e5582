//! Server-rendered pages. Just enough markup to drive the login flow.

use axum::{
    http::{HeaderMap, HeaderName, StatusCode, Uri, header::SET_COOKIE},
    response::{AppendHeaders, Html, IntoResponse},
};

use crate::auth::{AuthError, Authenticated, cookie};

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form id="login">
  <label>Email <input name="email" type="email" autocomplete="username" required></label>
  <label>Password <input name="password" type="password" autocomplete="current-password" required></label>
  <button type="submit">Sign in</button>
  <p id="error" role="alert"></p>
</form>
<script>
document.getElementById("login").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const res = await fetch("/api/auth/login", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ email: form.get("email"), password: form.get("password") }),
  });
  if (!res.ok) {
    document.getElementById("error").textContent = (await res.json()).error;
    return;
  }
  const target = new URLSearchParams(location.search).get("returnTo");
  location.href = target && target.startsWith("/") && !target.startsWith("//") ? target : "/";
});
</script>
</body>
</html>
"#;

/// Login form. The edge gate bounces visitors who already have a session.
pub async fn login() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// Landing page. A session cookie that no longer resolves is cleared so the
/// edge gate stops bouncing the visitor away from the login form.
pub async fn home(
    session: Result<Authenticated, AuthError>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let mut clear: Vec<(HeaderName, String)> = Vec::new();
    let identity = match session {
        Ok(Authenticated(identity)) => Some(identity),
        Err(AuthError::Unauthenticated) if cookie::session_token(&headers).is_some() => {
            tracing::debug!("Clearing stale session cookie");
            let secure = cookie::is_secure_request(&uri, &headers);
            clear.extend(cookie::clear_session(secure).map(|c| (SET_COOKIE, c)));
            None
        }
        Err(_) => None,
    };

    let name = identity.map_or_else(|| "guest".to_string(), |i| escape(&i.display_name));
    (
        AppendHeaders(clear),
        Html(format!(
            "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>Canvass</title></head>\
             <body><h1>Welcome, {name}</h1></body></html>"
        )),
    )
}

/// Anything unrouted.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
