//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - User and role storage with permission sets
//! - Signed session tokens carried in a cookie
//! - Double-submit CSRF protection
//! - The edge gate that redirects page requests by session presence
//! - The route guard extractor and the permission evaluator

pub mod activity;
mod authenticator;
mod config;
pub mod cookie;
pub mod csrf;
pub mod gate;
mod guard;
mod identity;
pub mod permissions;
mod roles;
/// First-run setup and seeding.
pub mod setup;
mod token;
mod users;

pub use activity::{ActivityAction, ActivityEntry, ActivityLog};
pub use authenticator::{Authenticator, NewUser};
pub use config::{AuthConfig, AuthConfigBuilder};
pub use guard::{AuthState, Authenticated, OptionalIdentity};
pub use identity::Identity;
pub use permissions::has;
pub use roles::{NewRole, Role, RoleStore};
pub use token::{SessionClaims, TokenCodec};
pub use users::{PublicUser, User, UserStore};

use canvass_core::ValidationError;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password; the cause is deliberately not revealed.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Session token is malformed, tampered with, or expired.
    #[error("Invalid session token")]
    InvalidToken,

    /// No usable session on the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated but the role lacks the permission.
    #[error("Insufficient permission: {0}")]
    InsufficientPermission(String),

    /// Unsafe request without a matching CSRF token pair.
    #[error("Invalid CSRF token")]
    InvalidCsrf,

    /// A record with the same unique key already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Request input failed validation.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Role not found.
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Login attempts exhausted for this account.
    #[error("Too many login attempts, try again later")]
    TooManyAttempts,

    /// Credential check or identity lookup exceeded its time bound.
    #[error("Authentication timed out")]
    Timeout,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}
