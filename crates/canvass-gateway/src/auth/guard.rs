//! Shared auth state and the route guard extractors.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::setup::ensure_default_roles;
use super::{
    ActivityLog, AuthConfig, AuthError, Authenticator, Identity, RoleStore, TokenCodec,
    UserStore, cookie,
};

const META_TREE: &str = "meta";
const SECRET_KEY: &[u8] = b"session_secret";

/// Load the persisted session secret, generating and storing one on first use.
fn stored_secret(db: &sled::Db) -> Result<String, AuthError> {
    let meta = db
        .open_tree(META_TREE)
        .map_err(|e| AuthError::Storage(format!("Failed to open meta tree: {e}")))?;

    let generated = TokenCodec::generate_hex_secret();
    let previous = meta
        .compare_and_swap(SECRET_KEY, None as Option<&[u8]>, Some(generated.as_bytes()))
        .map_err(|e| AuthError::Storage(format!("Meta error: {e}")))?;

    match previous {
        Ok(()) => {
            meta.flush()
                .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;
            tracing::warn!("No session secret configured; generated one and stored it in the data directory");
            Ok(generated)
        }
        Err(existing) => {
            let stored = existing
                .current
                .ok_or_else(|| AuthError::Storage("Stored session secret vanished".into()))?;
            String::from_utf8(stored.to_vec())
                .map_err(|e| AuthError::Storage(format!("Stored session secret is corrupt: {e}")))
        }
    }
}

/// Shared authentication state, built once at start-up and injected into the
/// router.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// Credential checks and identity resolution.
    pub authenticator: Authenticator,
    /// Auth event log.
    pub activity: ActivityLog,
    db: sled::Db,
}

impl AuthState {
    /// Assemble auth state from already opened parts.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        authenticator: Authenticator,
        activity: ActivityLog,
        db: sled::Db,
    ) -> Self {
        Self {
            config,
            authenticator,
            activity,
            db,
        }
    }

    /// Open the auth database under `data_dir`, seed default roles, and set up
    /// the token codec. Without a configured secret, the one stored alongside
    /// the database is used, generated on first start.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the secret is invalid.
    pub fn initialize(mut config: AuthConfig, data_dir: &Path) -> Result<Self, AuthError> {
        let db = sled::open(data_dir.join("auth"))
            .map_err(|e| AuthError::Storage(format!("Failed to open auth database: {e}")))?;

        let users = UserStore::with_db(&db)?;
        let roles = RoleStore::with_db(&db)?;
        let activity = ActivityLog::with_db(&db)?;
        ensure_default_roles(&roles)?;

        let secret = match &config.session_secret {
            Some(secret) => secret.clone(),
            None => {
                let secret = stored_secret(&db)?;
                config.session_secret = Some(secret.clone());
                secret
            }
        };
        let codec = TokenCodec::from_hex_secret(&secret, config.session_ttl())?;

        let authenticator = Authenticator::new(users, roles, codec, config.auth_timeout())?;

        tracing::info!(
            path = %data_dir.display(),
            users = authenticator.users().count(),
            "Auth state initialized"
        );

        Ok(Self::new(config, authenticator, activity, db))
    }

    /// Flush pending writes. Called on shutdown.
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails.
    pub fn close(&self) -> Result<(), AuthError> {
        self.db
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;
        tracing::debug!("Auth database flushed");
        Ok(())
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("user_count", &self.authenticator.users().count())
            .finish_non_exhaustive()
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
}

impl AuthError {
    /// HTTP status and machine-readable code.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::InvalidToken | Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            Self::InsufficientPermission(_) => (StatusCode::FORBIDDEN, "insufficient_permission"),
            Self::InvalidCsrf => (StatusCode::FORBIDDEN, "invalid_csrf"),
            Self::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "already_exists"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Self::UserNotFound(_) | Self::RoleNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, "too_many_attempts"),
            Self::Timeout => (StatusCode::SERVICE_UNAVAILABLE, "timeout"),
            Self::Storage(_) | Self::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Auth request failed");
        }

        let error = if matches!(self, Self::Storage(_) | Self::Config(_)) {
            "Internal error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(AuthErrorResponse { error, code })).into_response()
    }
}

/// Extractor for authenticated requests.
///
/// Resolves the session cookie into an [`Identity`]; the handler does not run
/// when that fails. Proves authentication only: handlers check permissions
/// themselves.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = Arc::<AuthState>::from_ref(state);
        let token = cookie::session_token(&parts.headers).ok_or(AuthError::Unauthenticated)?;

        match auth_state.authenticator.resolve(&token).await {
            Ok(identity) => Ok(Self(identity)),
            Err(
                AuthError::InvalidToken
                | AuthError::Unauthenticated
                | AuthError::UserNotFound(_)
                | AuthError::RoleNotFound(_),
            ) => Err(AuthError::Unauthenticated),
            Err(e) => Err(e),
        }
    }
}

/// Extractor for optional authentication. Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            Authenticated::from_request_parts(parts, state)
                .await
                .ok()
                .map(|Authenticated(identity)| identity),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request, header::COOKIE};
    use canvass_core::ValidationError;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> Arc<AuthState> {
        Arc::new(AuthState::initialize(AuthConfig::default(), dir.path()).unwrap())
    }

    fn parts(cookie: Option<&str>) -> Parts {
        let mut request = Request::builder().uri("/api/auth/me").body(()).unwrap();
        if let Some(cookie) = cookie {
            request
                .headers_mut()
                .insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        request.into_parts().0
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (AuthError::InvalidCredentials, 401, "invalid_credentials"),
            (AuthError::InvalidToken, 401, "unauthenticated"),
            (AuthError::InsufficientPermission("x".into()), 403, "insufficient_permission"),
            (AuthError::InvalidCsrf, 403, "invalid_csrf"),
            (AuthError::AlreadyExists("x".into()), 400, "already_exists"),
            (AuthError::Validation(ValidationError::InvalidEmail), 400, "invalid_input"),
            (AuthError::TooManyAttempts, 429, "too_many_attempts"),
            (AuthError::Timeout, 503, "timeout"),
            (AuthError::Storage("disk".into()), 500, "internal_error"),
        ];
        for (error, status, code) in cases {
            let (s, c) = error.status_and_code();
            assert_eq!(s.as_u16(), status, "{error}");
            assert_eq!(c, code);
        }
    }

    #[tokio::test]
    async fn test_initialize_seeds_roles() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let roles = state.authenticator.roles().list().unwrap();
        assert_eq!(roles.len(), 2);
        assert!(state.config.session_secret.is_some());
        state.close().unwrap();
    }

    #[test]
    fn test_generated_secret_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let first = AuthState::initialize(AuthConfig::default(), dir.path()).unwrap();
        let secret = first.config.session_secret.clone().unwrap();
        first.close().unwrap();
        drop(first);

        let second = AuthState::initialize(AuthConfig::default(), dir.path()).unwrap();
        assert_eq!(second.config.session_secret.as_deref(), Some(secret.as_str()));
        second.close().unwrap();
        drop(second);

        let configured = TokenCodec::generate_hex_secret();
        let third = AuthState::initialize(
            AuthConfig::builder().session_secret(configured.clone()).build(),
            dir.path(),
        )
        .unwrap();
        assert_eq!(third.config.session_secret, Some(configured));
    }

    #[tokio::test]
    async fn test_authenticated_extractor() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let admin = crate::auth::setup::create_admin(
            state.authenticator.users(),
            "root@campaign.org",
            "long-enough",
        )
        .unwrap();
        let identity = state
            .authenticator
            .authenticate(&admin.email, "long-enough")
            .await
            .unwrap()
            .unwrap();
        let token = state.authenticator.issue_token(&identity).unwrap();

        let cookie = format!("session={token}");
        let Authenticated(resolved) =
            Authenticated::from_request_parts(&mut parts(Some(&cookie)), &state)
                .await
                .unwrap();
        assert_eq!(resolved.id, admin.id);

        let missing = Authenticated::from_request_parts(&mut parts(None), &state).await;
        assert!(matches!(missing, Err(AuthError::Unauthenticated)));

        let forged = Authenticated::from_request_parts(&mut parts(Some("session=forged")), &state).await;
        assert!(matches!(forged, Err(AuthError::Unauthenticated)));

        let OptionalIdentity(none) =
            OptionalIdentity::from_request_parts(&mut parts(None), &state)
                .await
                .unwrap();
        assert!(none.is_none());
    }
}
