//! Seeding of default roles and the first admin account.

use canvass_core::RoleId;
use canvass_core::validation::{validate_email, validate_password};
use rand::Rng;
use rand::rngs::OsRng;

use super::permissions::{ADMIN_ROLE, ALL_PERMISSIONS};
use super::{AuthError, Role, RoleStore, User, UserStore};

/// Name of the default non-admin role.
pub const LEADER_ROLE: &str = "leader";

/// Env var holding the first admin's email.
pub const ADMIN_EMAIL_ENV: &str = "CANVASS_ADMIN_EMAIL";
/// Env var holding the first admin's password.
pub const ADMIN_PASSWORD_ENV: &str = "CANVASS_ADMIN_PASSWORD";

/// Create the `admin` and `leader` roles if they are missing.
///
/// Returns the number of roles created.
///
/// # Errors
///
/// Returns error if storage fails.
pub fn ensure_default_roles(roles: &RoleStore) -> Result<usize, AuthError> {
    let defaults = [
        Role {
            id: RoleId::admin(),
            name: ADMIN_ROLE.to_string(),
            localized_name: "Administrator".to_string(),
            permissions: [ALL_PERMISSIONS.to_string()].into_iter().collect(),
        },
        Role {
            id: RoleId::leader(),
            name: LEADER_ROLE.to_string(),
            localized_name: "Leader".to_string(),
            permissions: ["persons.read", "persons.create", "messages.read"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        },
    ];

    let mut created = 0;
    for role in defaults {
        if roles.get_by_name(&role.name)?.is_none() {
            roles.create(&role)?;
            tracing::info!(role = %role.name, "Seeded default role");
            created += 1;
        }
    }

    Ok(created)
}

/// Create an admin account with the given credentials.
///
/// # Errors
///
/// Returns `Validation` for a bad email or password, `AlreadyExists` if the
/// email is taken, or a storage error.
pub fn create_admin(users: &UserStore, email: &str, password: &str) -> Result<User, AuthError> {
    let email = validate_email(email)?;
    validate_password(password)?;

    let username = email.split('@').next().unwrap_or("admin").to_string();
    let mut admin = User::new(email, username, password, RoleId::admin())?;
    admin.display_name = "Administrator".to_string();
    users.create(&admin)?;

    Ok(admin)
}

/// Auto-setup from environment variables.
///
/// Creates an admin from `CANVASS_ADMIN_EMAIL` and `CANVASS_ADMIN_PASSWORD`
/// when both are set and no users exist yet.
///
/// # Errors
///
/// Returns error if user creation fails.
pub fn auto_setup_from_env(users: &UserStore) -> Result<Option<User>, AuthError> {
    // Only auto-setup if no users exist
    if !users.is_empty() {
        return Ok(None);
    }

    let email = match std::env::var(ADMIN_EMAIL_ENV) {
        Ok(e) if !e.is_empty() => e,
        _ => return Ok(None),
    };

    let password = match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(p) if !p.is_empty() => p,
        _ => return Ok(None),
    };

    let admin = create_admin(users, &email, &password)?;

    tracing::info!(
        email = %admin.email,
        "Admin user created from environment variables"
    );

    Ok(Some(admin))
}

/// Generate a secure random password.
#[must_use]
pub fn generate_password(length: usize) -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = OsRng;

    (0..length)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}
