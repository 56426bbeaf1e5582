//! Permission evaluation.
//!
//! Permission strings are opaque and compared by exact match. Two sentinels
//! short-circuit the lookup: a role named [`ADMIN_ROLE`], and a permission set
//! containing [`ALL_PERMISSIONS`].

use super::Identity;

/// Role name that is granted every permission regardless of its stored set.
pub const ADMIN_ROLE: &str = "admin";

/// Permission entry that grants every permission.
pub const ALL_PERMISSIONS: &str = "all";

/// List user accounts.
pub const USERS_READ: &str = "users.read";
/// Create user accounts.
pub const USERS_CREATE: &str = "users.create";
/// List roles.
pub const ROLES_READ: &str = "roles.read";
/// Create and edit roles.
pub const ROLES_MANAGE: &str = "roles.manage";
/// Read the activity log.
pub const LOGS_READ: &str = "logs.read";

/// Check whether `identity` is granted `permission`.
///
/// An absent identity is granted nothing.
#[must_use]
pub fn has(identity: Option<&Identity>, permission: &str) -> bool {
    let Some(identity) = identity else {
        return false;
    };
    let role = &identity.role;

    role.name == ADMIN_ROLE || role.grants_all() || role.contains(permission)
}
