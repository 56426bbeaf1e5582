//! JSON API handlers.
//!
//! Every handler except login and logout takes [`Authenticated`], then checks
//! the permission it needs before touching the stores.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};

use crate::auth::{
    ActivityAction, ActivityEntry, AuthError, AuthState, Authenticated, Identity, NewRole,
    NewUser, OptionalIdentity, PublicUser, Role, cookie, csrf, permissions,
};
use crate::middleware::LoginRateLimiter;

/// Default page size for the activity listing.
const DEFAULT_ACTIVITY_LIMIT: usize = 50;
/// Largest page the activity listing returns.
const MAX_ACTIVITY_LIMIT: usize = 500;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The logged-in identity.
    pub user: Identity,
    /// CSRF token, also set as a cookie.
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CsrfResponse {
    csrf_token: String,
}

/// Check credentials, then set the session and CSRF cookies.
pub async fn login(
    State(auth): State<Arc<AuthState>>,
    State(limiter): State<Arc<LoginRateLimiter>>,
    uri: Uri,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if !limiter.check(&request.email) {
        tracing::warn!(email = %request.email, "Login throttled");
        return Err(AuthError::TooManyAttempts);
    }

    let Some(identity) = auth
        .authenticator
        .authenticate(&request.email, &request.password)
        .await?
    else {
        auth.activity
            .note(None, ActivityAction::LoginFailed, request.email.trim());
        return Err(AuthError::InvalidCredentials);
    };

    let token = auth.authenticator.issue_token(&identity)?;
    let csrf_token = csrf::generate();
    let secure = cookie::is_secure_request(&uri, &headers);

    auth.activity
        .note(Some(&identity.id), ActivityAction::Login, identity.email.as_str());
    tracing::info!(user_id = %identity.id, "User logged in");

    Ok((
        AppendHeaders([
            (
                SET_COOKIE,
                cookie::session(&token, auth.config.session_ttl(), secure),
            ),
            (
                SET_COOKIE,
                csrf::cookie(&csrf_token, auth.config.csrf_ttl(), secure),
            ),
        ]),
        Json(LoginResponse {
            user: identity,
            csrf_token,
        }),
    ))
}

/// Expire the session and CSRF cookies.
///
/// Tokens are not tracked server-side, so a copied token stays valid until
/// it expires.
pub async fn logout(
    State(auth): State<Arc<AuthState>>,
    OptionalIdentity(identity): OptionalIdentity,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let secure = cookie::is_secure_request(&uri, &headers);
    if let Some(identity) = &identity {
        auth.activity
            .note(Some(&identity.id), ActivityAction::Logout, identity.email.as_str());
    }

    let [secure_session, plain_session] = cookie::clear_session(secure);
    (
        AppendHeaders([
            (SET_COOKIE, secure_session),
            (SET_COOKIE, plain_session),
            (SET_COOKIE, csrf::clear(secure)),
        ]),
        Json(serde_json::json!({ "success": true })),
    )
}

/// The caller's identity.
pub async fn me(Authenticated(identity): Authenticated) -> Json<Identity> {
    Json(identity)
}

/// Issue a fresh CSRF cookie for a live session.
pub async fn reissue_csrf(
    State(auth): State<Arc<AuthState>>,
    Authenticated(_identity): Authenticated,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let csrf_token = csrf::generate();
    let secure = cookie::is_secure_request(&uri, &headers);

    (
        AppendHeaders([(
            SET_COOKIE,
            csrf::cookie(&csrf_token, auth.config.csrf_ttl(), secure),
        )]),
        Json(CsrfResponse { csrf_token }),
    )
}

/// List user accounts.
pub async fn list_users(
    State(auth): State<Arc<AuthState>>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    identity.require(permissions::USERS_READ)?;

    let state = Arc::clone(&auth);
    let users = auth
        .authenticator
        .blocking(move || state.authenticator.users().list())
        .await?;
    Ok(Json(users.iter().map(crate::auth::User::to_public).collect()))
}

/// Create a user account.
pub async fn create_user(
    State(auth): State<Arc<AuthState>>,
    Authenticated(identity): Authenticated,
    Json(fields): Json<NewUser>,
) -> Result<(StatusCode, Json<Identity>), AuthError> {
    identity.require(permissions::USERS_CREATE)?;

    let created = auth.authenticator.create_user(fields).await?;
    auth.activity
        .note(Some(&identity.id), ActivityAction::UserCreated, created.email.as_str());

    Ok((StatusCode::CREATED, Json(created)))
}

/// List roles.
pub async fn list_roles(
    State(auth): State<Arc<AuthState>>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<Role>>, AuthError> {
    identity.require(permissions::ROLES_READ)?;

    let state = Arc::clone(&auth);
    let roles = auth
        .authenticator
        .blocking(move || state.authenticator.roles().list())
        .await?;
    Ok(Json(roles))
}

/// Create a role.
pub async fn create_role(
    State(auth): State<Arc<AuthState>>,
    Authenticated(identity): Authenticated,
    Json(fields): Json<NewRole>,
) -> Result<(StatusCode, Json<Role>), AuthError> {
    identity.require(permissions::ROLES_MANAGE)?;

    let role = fields.into_role()?;
    let state = Arc::clone(&auth);
    let role = auth
        .authenticator
        .blocking(move || state.authenticator.roles().create(&role).map(|()| role))
        .await?;
    auth.activity
        .note(Some(&identity.id), ActivityAction::RoleCreated, role.name.as_str());
    tracing::info!(role = %role.name, user_id = %identity.id, "Created role");

    Ok((StatusCode::CREATED, Json(role)))
}

/// Activity listing query.
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    /// Number of entries; clamped to `1..=500`.
    pub limit: Option<usize>,
}

/// Newest activity entries first.
pub async fn list_activity(
    State(auth): State<Arc<AuthState>>,
    Authenticated(identity): Authenticated,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, AuthError> {
    identity.require(permissions::LOGS_READ)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let state = Arc::clone(&auth);
    let entries = auth
        .authenticator
        .blocking(move || state.activity.recent(limit))
        .await?;
    Ok(Json(entries))
}
