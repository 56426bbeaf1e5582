//! User records and storage.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use canvass_core::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Stored user account. Only the store and the authenticator see the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email (normalized, unique).
    pub email: String,
    /// Short handle.
    pub username: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Argon2 password hash (PHC string).
    pub password_hash: String,
    /// Assigned role.
    pub role_id: RoleId,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user last logged in.
    pub last_login: Option<DateTime<Utc>>,
    /// Whether the account may log in.
    pub active: bool,
}

impl User {
    /// Create a new user, hashing the password.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: &str,
        role_id: RoleId,
    ) -> Result<Self, AuthError> {
        let username = username.into();
        Ok(Self {
            id: UserId::generate(),
            email: email.into(),
            display_name: username.clone(),
            username,
            phone: None,
            avatar: None,
            password_hash: hash_password(password)?,
            role_id,
            created_at: Utc::now(),
            last_login: None,
            active: true,
        })
    }

    /// Update the user's password.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn set_password(&mut self, password: &str) -> Result<(), AuthError> {
        self.password_hash = hash_password(password)?;
        Ok(())
    }

    /// Create a safe version of user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role_id: self.role_id.clone(),
            created_at: self.created_at,
            last_login: self.last_login,
            active: self.active,
        }
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Username.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Assigned role.
    pub role_id: RoleId,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// Last login time.
    pub last_login: Option<DateTime<Utc>>,
    /// Whether active.
    pub active: bool,
}

/// User store backed by sled.
#[derive(Clone)]
pub struct UserStore {
    tree: sled::Tree,
}

impl UserStore {
    /// Open the users tree of an existing database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: &sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("users")
            .map_err(|e| AuthError::Storage(format!("Failed to open users tree: {e}")))?;

        Ok(Self { tree })
    }

    /// Check if any users exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Count total users.
    #[must_use]
    pub fn count(&self) -> usize {
        // Count entries that don't start with "idx:" prefix
        self.tree
            .iter()
            .filter(|r| {
                r.as_ref()
                    .map(|(k, _)| !k.starts_with(b"idx:"))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the email is taken, or a storage error.
    pub fn create(&self, user: &User) -> Result<(), AuthError> {
        let index_key = email_index_key(&user.email);

        // Claim the email atomically so concurrent sign-ups cannot both win.
        let claimed = self
            .tree
            .compare_and_swap(
                index_key.as_bytes(),
                None as Option<&[u8]>,
                Some(user.id.0.as_bytes()),
            )
            .map_err(|e| AuthError::Storage(format!("Index error: {e}")))?;
        if claimed.is_err() {
            return Err(AuthError::AlreadyExists(format!("user {}", user.email)));
        }

        self.put(user)?;
        self.flush()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        match self.tree.get(id.0.as_bytes()) {
            Ok(Some(value)) => {
                let user: User = serde_json::from_slice(&value)
                    .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Get error: {e}"))),
        }
    }

    /// Get a user by (normalized) email.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        match self.tree.get(email_index_key(email).as_bytes()) {
            Ok(Some(id_bytes)) => {
                let id = UserId::new(String::from_utf8_lossy(&id_bytes));
                self.get(&id)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Index lookup error: {e}"))),
        }
    }

    /// Update an existing user. The email is immutable.
    ///
    /// # Errors
    ///
    /// Returns error if user doesn't exist or storage fails.
    pub fn update(&self, user: &User) -> Result<(), AuthError> {
        let existing = self
            .get(&user.id)?
            .ok_or_else(|| AuthError::UserNotFound(user.id.0.clone()))?;
        if existing.email != user.email {
            return Err(AuthError::Config("Email cannot be changed".to_string()));
        }

        self.put(user)?;
        self.flush()
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: &UserId) -> Result<bool, AuthError> {
        if let Some(user) = self.get(id)? {
            self.tree
                .remove(email_index_key(&user.email).as_bytes())
                .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
        }

        let removed = self
            .tree
            .remove(id.0.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Delete error: {e}")))?
            .is_some();

        self.flush()?;
        Ok(removed)
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<User>, AuthError> {
        let mut users = Vec::new();

        for result in self.tree.iter() {
            let (key, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;

            // Skip index entries
            if key.starts_with(b"idx:") {
                continue;
            }

            let user: User = serde_json::from_slice(&value)
                .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
            users.push(user);
        }

        Ok(users)
    }

    /// Update last login time for a user.
    ///
    /// # Errors
    ///
    /// Returns error if user doesn't exist or storage fails.
    pub fn update_last_login(&self, id: &UserId) -> Result<(), AuthError> {
        let mut user = self
            .get(id)?
            .ok_or_else(|| AuthError::UserNotFound(id.0.clone()))?;

        user.last_login = Some(Utc::now());
        self.update(&user)
    }

    fn put(&self, user: &User) -> Result<(), AuthError> {
        let value = serde_json::to_vec(user)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;

        self.tree
            .insert(user.id.0.as_bytes(), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuthError> {
        self.tree
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;
        Ok(())
    }
}

fn email_index_key(email: &str) -> String {
    format!("idx:email:{email}")
}

/// Hash a password using Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Config(format!("Password hashing failed: {e}")))
}

/// Verify a password against a hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::Config(format!("Invalid hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
