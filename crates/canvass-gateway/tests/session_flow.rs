//! End-to-end session, CSRF, gate and permission behavior through the router.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use canvass_gateway::auth::{AuthConfig, AuthState, NewUser, setup};
use canvass_gateway::{GatewayState, LoginRateLimiter, router};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "root@campaign.org";
const LEADER_EMAIL: &str = "ana@campaign.org";
const PASSWORD: &str = "correct horse battery";

struct TestApp {
    dir: TempDir,
    attempts_per_minute: u32,
    app: Router,
}

/// Cookies and CSRF token from a successful login.
struct Session {
    cookie: String,
    csrf: String,
}

impl Session {
    fn cookie_header(&self) -> String {
        format!("{}; csrf_token={}", self.cookie, self.csrf)
    }
}

fn open_state(dir: &TempDir) -> Arc<AuthState> {
    Arc::new(AuthState::initialize(AuthConfig::default(), dir.path()).unwrap())
}

fn build_app(dir: TempDir, auth: Arc<AuthState>, attempts_per_minute: u32) -> TestApp {
    let state = GatewayState {
        auth,
        login_limiter: Arc::new(LoginRateLimiter::new(attempts_per_minute)),
    };

    TestApp {
        dir,
        attempts_per_minute,
        app: router(state),
    }
}

async fn setup_app(attempts_per_minute: u32) -> TestApp {
    let dir = TempDir::new().unwrap();
    let auth = open_state(&dir);

    setup::create_admin(auth.authenticator.users(), ADMIN_EMAIL, PASSWORD).unwrap();
    auth.authenticator
        .create_user(NewUser {
            email: LEADER_EMAIL.to_string(),
            password: PASSWORD.to_string(),
            username: None,
            display_name: Some("Ana".to_string()),
            phone: None,
            avatar: None,
            role_id: None,
        })
        .await
        .unwrap();

    build_app(dir, auth, attempts_per_minute)
}

impl TestApp {
    /// Drop the running state and start again on the same data directory.
    fn restart(self) -> Self {
        let Self {
            dir,
            attempts_per_minute,
            app,
        } = self;
        drop(app);
        let auth = open_state(&dir);
        build_app(dir, auth, attempts_per_minute)
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn login_response(&self, email: &str, password: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "email": email, "password": password }).to_string(),
            ))
            .unwrap();
        self.send(request).await
    }

    async fn login(&self, email: &str) -> Session {
        let response = self.login_response(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        let session = cookies
            .iter()
            .find(|c| c.starts_with("session="))
            .map(|c| first_pair(c))
            .unwrap();
        let csrf = cookies
            .iter()
            .find(|c| c.starts_with("csrf_token="))
            .map(|c| first_pair(c).trim_start_matches("csrf_token=").to_string())
            .unwrap();

        Session {
            cookie: session,
            csrf,
        }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_json(
        &self,
        uri: &str,
        session: &Session,
        csrf_header: Option<&str>,
        body: Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, session.cookie_header());
        if let Some(token) = csrf_header {
            builder = builder.header("x-csrf-token", token);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn first_pair(cookie: &str) -> String {
    cookie.split(';').next().unwrap().to_string()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers().get(LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn login_sets_cookies_and_guard_accepts_them() {
    let app = setup_app(10).await;

    let response = app.login_response(LEADER_EMAIL, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let session = cookies.iter().find(|c| c.starts_with("session=")).unwrap();
    assert!(session.contains("Max-Age=604800"));
    assert!(session.contains("HttpOnly"));
    assert!(session.contains("SameSite=Lax"));
    assert!(!session.contains("Secure"));

    let csrf = cookies.iter().find(|c| c.starts_with("csrf_token=")).unwrap();
    assert!(csrf.contains("Max-Age=3600"));
    assert!(csrf.contains("SameSite=Strict"));
    assert!(!csrf.contains("HttpOnly"));

    let body = json_body(response).await;
    assert_eq!(body["user"]["email"], LEADER_EMAIL);
    assert_eq!(body["user"]["role"]["name"], "leader");
    assert!(body["user"].get("password_hash").is_none());

    let session = app.login(LEADER_EMAIL).await;
    let me = app.get("/api/auth/me", Some(&session.cookie)).await;
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(json_body(me).await["display_name"], "Ana");

    let anonymous = app.get("/api/auth/me", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(anonymous).await["code"], "unauthenticated");
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let app = setup_app(10).await;

    let wrong_password = app.login_response(LEADER_EMAIL, "wrong password").await;
    let unknown_user = app.login_response("nobody@campaign.org", PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&wrong_password).is_empty());
    assert_eq!(json_body(wrong_password).await, json_body(unknown_user).await);
}

#[tokio::test]
async fn forged_session_cookie_is_unauthenticated() {
    let app = setup_app(10).await;

    let response = app
        .get("/api/auth/me", Some("session=eyJhbGciOiJub25lIn0.e30."))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gate_redirects_anonymous_visitors_to_login() {
    let app = setup_app(10).await;

    let response = app.get("/reports?x=1", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login?returnTo=%2Freports%3Fx%3D1");

    let login = app.get("/login", None).await;
    assert_eq!(login.status(), StatusCode::OK);

    let health = app.get("/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);

    // API paths are never redirected; the guard answers instead.
    let api = app.get("/api/users", None).await;
    assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gate_bounces_signed_in_users_off_login() {
    let app = setup_app(10).await;
    let session = app.login(LEADER_EMAIL).await;

    let response = app
        .get("/login?returnTo=/dashboard", Some(&session.cookie))
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard");

    let response = app.get("/login", Some(&session.cookie)).await;
    assert_eq!(location(&response), "/");

    let response = app
        .get("/login?returnTo=//evil.example", Some(&session.cookie))
        .await;
    assert_eq!(location(&response), "/");

    let home = app.get("/", Some(&session.cookie)).await;
    assert_eq!(home.status(), StatusCode::OK);
}

#[tokio::test]
async fn sessions_survive_a_restart() {
    let app = setup_app(10).await;
    let session = app.login(LEADER_EMAIL).await;

    let app = app.restart();

    let me = app.get("/api/auth/me", Some(&session.cookie)).await;
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(json_body(me).await["email"], LEADER_EMAIL);

    let home = app.get("/", Some(&session.cookie)).await;
    assert_eq!(home.status(), StatusCode::OK);
    assert!(set_cookies(&home).is_empty());
}

#[tokio::test]
async fn stale_session_cookie_is_cleared_by_home() {
    let app = setup_app(10).await;
    let stale = "session=eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl";

    // The gate only sees a cookie, so the login form bounces home.
    let login = app.get("/login", Some(stale)).await;
    assert_eq!(login.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&login), "/");

    let home = app.get("/", Some(stale)).await;
    assert_eq!(home.status(), StatusCode::OK);
    let cleared = set_cookies(&home);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().any(|c| c.starts_with("session=;")));
    assert!(cleared.iter().any(|c| c.starts_with("__Host-session=;")));
    assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));

    // With the cookie gone the login form is reachable again.
    let login = app.get("/login", None).await;
    assert_eq!(login.status(), StatusCode::OK);

    let anonymous = app.get("/", None).await;
    assert!(set_cookies(&anonymous).is_empty());
}

#[tokio::test]
async fn unsafe_requests_need_csrf_token() {
    let app = setup_app(10).await;
    let session = app.login(ADMIN_EMAIL).await;
    let role = json!({ "name": "coordinator", "permissions": ["persons.read"] });

    let missing = app
        .post_json("/api/roles", &session, None, role.clone())
        .await;
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(missing).await["code"], "invalid_csrf");

    let mismatched = app
        .post_json("/api/roles", &session, Some("not-the-token"), role.clone())
        .await;
    assert_eq!(mismatched.status(), StatusCode::FORBIDDEN);

    let created = app
        .post_json("/api/roles", &session, Some(&session.csrf), role.clone())
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(json_body(created).await["name"], "coordinator");

    let duplicate = app
        .post_json("/api/roles", &session, Some(&session.csrf), role)
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(duplicate).await["code"], "already_exists");
}

#[tokio::test]
async fn handlers_enforce_permissions() {
    let app = setup_app(10).await;
    let leader = app.login(LEADER_EMAIL).await;
    let admin = app.login(ADMIN_EMAIL).await;

    let denied = app.get("/api/users", Some(&leader.cookie)).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(denied).await["code"], "insufficient_permission");

    let listed = app.get("/api/users", Some(&admin.cookie)).await;
    assert_eq!(listed.status(), StatusCode::OK);
    let users = json_body(listed).await;
    assert_eq!(users.as_array().unwrap().len(), 2);
    assert!(users[0].get("password_hash").is_none());

    let new_user = json!({ "email": "bo@campaign.org", "password": "long-enough" });
    let forbidden = app
        .post_json("/api/users", &leader, Some(&leader.csrf), new_user.clone())
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let created = app
        .post_json("/api/users", &admin, Some(&admin.csrf), new_user)
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn logout_expires_both_cookies() {
    let app = setup_app(10).await;
    let session = app.login(LEADER_EMAIL).await;

    let response = app
        .post_json("/api/auth/logout", &session, Some(&session.csrf), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    for name in ["__Host-session=;", "session=;", "csrf_token=;"] {
        let cookie = cookies.iter().find(|c| c.starts_with(name)).unwrap();
        assert!(cookie.contains("Max-Age=0"), "{cookie}");
    }

    // The browser drops the cookie; the next call arrives without it.
    let after = app.get("/api/auth/me", None).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn https_requests_get_host_prefixed_secure_cookie() {
    let app = setup_app(10).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .header("x-forwarded-proto", "https")
        .body(Body::from(
            json!({ "email": LEADER_EMAIL, "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = app.send(request).await;

    let cookies = set_cookies(&response);
    let session = cookies
        .iter()
        .find(|c| c.starts_with("__Host-session="))
        .unwrap();
    assert!(session.ends_with("; Secure"));

    let me = app
        .get("/api/auth/me", Some(&first_pair(session)))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_attempts_are_throttled_per_account() {
    let app = setup_app(2).await;

    for _ in 0..2 {
        let response = app.login_response(LEADER_EMAIL, "wrong password").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let throttled = app.login_response(LEADER_EMAIL, PASSWORD).await;
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(throttled).await["code"], "too_many_attempts");

    let other = app.login_response(ADMIN_EMAIL, PASSWORD).await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn activity_log_lists_newest_first() {
    let app = setup_app(10).await;
    let failed = app.login_response(LEADER_EMAIL, "wrong password").await;
    assert_eq!(failed.status(), StatusCode::UNAUTHORIZED);
    let admin = app.login(ADMIN_EMAIL).await;

    let response = app
        .get("/api/activity?limit=2", Some(&admin.cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = json_body(response).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "login");
    assert_eq!(entries[1]["action"], "login_failed");
    assert_eq!(entries[1]["detail"], LEADER_EMAIL);

    let long_email = format!("{}@campaign.org", "x".repeat(5_000));
    let failed = app.login_response(&long_email, PASSWORD).await;
    assert_eq!(failed.status(), StatusCode::UNAUTHORIZED);
    let response = app
        .get("/api/activity?limit=1", Some(&admin.cookie))
        .await;
    let entries = json_body(response).await;
    let detail = entries[0]["detail"].as_str().unwrap();
    assert_eq!(entries[0]["action"], "login_failed");
    assert_eq!(detail.len(), canvass_core::validation::limits::MAX_SHORT_TEXT);

    let leader = app.login(LEADER_EMAIL).await;
    let denied = app.get("/api/activity", Some(&leader.cookie)).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn csrf_token_can_be_reissued() {
    let app = setup_app(10).await;
    let session = app.login(LEADER_EMAIL).await;

    let response = app.get("/api/auth/csrf", Some(&session.cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    let fresh = cookies
        .iter()
        .find(|c| c.starts_with("csrf_token="))
        .unwrap();
    let token = json_body(response).await["csrfToken"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(fresh.starts_with(&format!("csrf_token={token};")));
    assert_ne!(token, session.csrf);

    let anonymous = app.get("/api/auth/csrf", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
