//! The authenticated identity handed to route handlers.

use canvass_core::UserId;
use serde::Serialize;

use super::{AuthError, Role, User, permissions};

/// A user record hydrated with its role. Never carries credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    /// User ID.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Short handle.
    pub username: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// Resolved role.
    pub role: Role,
}

impl Identity {
    /// Build an identity from a stored user and its resolved role.
    #[must_use]
    pub fn from_parts(user: User, role: Role) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            display_name: user.display_name,
            phone: user.phone,
            avatar: user.avatar,
            role,
        }
    }

    /// Shorthand for [`permissions::has`] on this identity.
    #[must_use]
    pub fn has(&self, permission: &str) -> bool {
        permissions::has(Some(self), permission)
    }

    /// Fail with `InsufficientPermission` unless the permission is granted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InsufficientPermission` naming the permission.
    pub fn require(&self, permission: &str) -> Result<(), AuthError> {
        if self.has(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, permission, "Permission denied");
            Err(AuthError::InsufficientPermission(permission.to_string()))
        }
    }
}
