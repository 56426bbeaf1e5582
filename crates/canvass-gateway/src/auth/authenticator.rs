//! Credential verification, token issuance and identity resolution.

use std::time::Duration;

use canvass_core::RoleId;
use canvass_core::validation::{
    limits, normalize_email, sanitize_text, validate_email, validate_identifier,
    validate_password,
};
use serde::Deserialize;

use super::users::{hash_password, verify_password};
use super::{AuthError, Identity, RoleStore, TokenCodec, User, UserStore};

/// Fields accepted when creating a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Handle; defaults to the email's local part.
    #[serde(default)]
    pub username: Option<String>,
    /// Display name; defaults to the username.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Role; defaults to the seeded leader role.
    #[serde(default)]
    pub role_id: Option<RoleId>,
}

/// Verifies credentials against the user store and mints session tokens.
///
/// Password hashing and store access run on the blocking pool, each bounded
/// by the configured timeout.
pub struct Authenticator {
    users: UserStore,
    roles: RoleStore,
    codec: TokenCodec,
    timeout: Duration,
    /// Verified against when the email is unknown, so both paths cost one hash.
    dummy_hash: String,
}

impl Authenticator {
    /// Create an authenticator over the given stores.
    ///
    /// # Errors
    ///
    /// Returns error if the placeholder hash cannot be computed.
    pub fn new(
        users: UserStore,
        roles: RoleStore,
        codec: TokenCodec,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hash_password(&hex::encode(TokenCodec::generate_secret()))?;
        Ok(Self {
            users,
            roles,
            codec,
            timeout,
            dummy_hash,
        })
    }

    /// User store handle.
    #[must_use]
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// Role store handle.
    #[must_use]
    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    /// Token codec.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Check an email/password pair.
    ///
    /// Returns `Ok(None)` for an unknown email, a wrong password, or a
    /// disabled account; callers cannot tell these apart.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or a storage error. Never returns `InvalidCredentials`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError> {
        let email = normalize_email(email);
        let users = self.users.clone();
        let lookup = email.clone();
        let user = self
            .blocking(move || users.get_by_email(&lookup))
            .await?
            .filter(|user| user.active);

        let hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |u| u.password_hash.clone());
        let password = password.to_string();
        let verified = self
            .blocking(move || Ok(verify_password(&password, &hash).is_ok()))
            .await?;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                tracing::debug!(email = %email, "Credential check failed");
                return Ok(None);
            }
        };

        let users = self.users.clone();
        let id = user.id.clone();
        self.blocking(move || users.update_last_login(&id)).await?;

        match self.hydrate(user).await {
            Ok(identity) => Ok(Some(identity)),
            Err(AuthError::RoleNotFound(role)) => {
                tracing::warn!(email = %email, role = %role, "User references a missing role");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Mint a session token for an identity.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let claims = self
            .codec
            .claims_for(&identity.id, &identity.email, &identity.role.id);
        self.codec.encode(&claims)
    }

    /// Resolve a session token into a full identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for a bad token, `Unauthenticated` for an
    /// unknown or disabled user, `RoleNotFound` for a dangling role, or a
    /// storage/timeout error.
    pub async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.codec.decode(token)?;
        let users = self.users.clone();
        let id = claims.user_id();
        let user = self
            .blocking(move || users.get(&id))
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if !user.active {
            tracing::debug!(user_id = %user.id, "Session for disabled account");
            return Err(AuthError::Unauthenticated);
        }

        self.hydrate(user).await
    }

    /// Validate fields and create a user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad input, `RoleNotFound` for an unknown role,
    /// `AlreadyExists` if the email is taken, or a storage/timeout error.
    pub async fn create_user(&self, fields: NewUser) -> Result<Identity, AuthError> {
        let email = validate_email(&fields.email)?;
        validate_password(&fields.password)?;

        let username = match fields.username {
            Some(username) => validate_identifier("username", &username)?,
            None => validate_identifier(
                "username",
                email.split('@').next().unwrap_or_default(),
            )?,
        };
        let display_name = match fields.display_name {
            Some(name) => sanitize_text("display_name", &name, limits::MAX_SHORT_TEXT)?,
            None => username.clone(),
        };
        let phone = fields
            .phone
            .map(|p| sanitize_text("phone", &p, limits::MAX_SHORT_TEXT))
            .transpose()?;
        let avatar = fields
            .avatar
            .map(|a| sanitize_text("avatar", &a, limits::MAX_URL_LENGTH))
            .transpose()?;
        let role_id = fields.role_id.unwrap_or_else(RoleId::leader);

        let users = self.users.clone();
        let roles = self.roles.clone();
        let password = fields.password;
        let user = self
            .blocking(move || {
                let role = roles
                    .get(&role_id)?
                    .ok_or_else(|| AuthError::RoleNotFound(role_id.0.clone()))?;
                if users.get_by_email(&email)?.is_some() {
                    return Err(AuthError::AlreadyExists(format!("user {email}")));
                }

                let mut user = User::new(email, username, &password, role.id)?;
                user.display_name = display_name;
                user.phone = phone;
                user.avatar = avatar;
                users.create(&user)?;
                Ok(user)
            })
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "Created user");
        self.hydrate(user).await
    }

    async fn hydrate(&self, user: User) -> Result<Identity, AuthError> {
        let roles = self.roles.clone();
        let role_id = user.role_id.clone();
        let role = self
            .blocking(move || roles.get(&role_id))
            .await?
            .ok_or_else(|| AuthError::RoleNotFound(user.role_id.0.clone()))?;

        Ok(Identity::from_parts(user, role))
    }

    /// Run store or hash work on the blocking pool under the auth timeout.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> Result<T, AuthError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AuthError::Storage(format!("Blocking task failed: {e}"))),
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Auth operation timed out");
                Err(AuthError::Timeout)
            }
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("codec", &self.codec)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
