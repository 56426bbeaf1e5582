//! Session token codec.
//!
//! Tokens are HS256-signed JWTs. Nothing is kept server-side: a token is valid
//! while its signature checks out and `exp` lies in the future, so sessions can
//! only be cut short by rotating the secret or deactivating the user.

use std::time::Duration;

use canvass_core::{RoleId, UserId};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Identity claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Email at login time.
    pub email: String,
    /// Role ID at login time.
    pub role_id: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl SessionClaims {
    /// Claims for a user, valid for `ttl` from now.
    #[must_use]
    pub fn new(user_id: &UserId, email: &str, role_id: &RoleId, ttl: Duration) -> Self {
        let now = Utc::now();
        let exp = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            sub: user_id.0.clone(),
            email: email.to_string(),
            role_id: role_id.0.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    /// The user ID these claims refer to.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::new(self.sub.clone())
    }
}

/// Encodes and decodes signed session tokens.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from a raw secret.
    ///
    /// The secret should be at least 32 bytes.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Create a codec from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails or the secret is shorter than 32 bytes.
    pub fn from_hex_secret(hex_secret: &str, ttl: Duration) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret)
            .map_err(|e| AuthError::Config(format!("Invalid hex secret: {e}")))?;
        if secret.len() < 32 {
            return Err(AuthError::Config(
                "Session secret must be at least 32 bytes".to_string(),
            ));
        }
        Ok(Self::new(&secret, ttl))
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Session lifetime applied by [`Self::claims_for`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh claims for a user using this codec's lifetime.
    #[must_use]
    pub fn claims_for(&self, user_id: &UserId, email: &str, role_id: &RoleId) -> SessionClaims {
        SessionClaims::new(user_id, email, role_id, self.ttl)
    }

    /// Serialize and sign claims.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn encode(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Config(format!("Token encoding failed: {e}")))
    }

    /// Verify and decode a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for anything that is not a valid,
    /// unexpired token signed with this codec's secret.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AuthError::InvalidToken
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
