//! Role model and storage.

use std::collections::BTreeSet;

use canvass_core::RoleId;
use canvass_core::validation::{limits, sanitize_text, validate_identifier, validate_permission};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::permissions::ALL_PERMISSIONS;

/// A named bundle of permission strings.
///
/// `permissions` is persisted as a plain list. The single string `all` grants
/// everything; any other entry is matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role ID.
    pub id: RoleId,
    /// Machine name (unique), e.g. `admin`.
    pub name: String,
    /// Display name shown to staff.
    pub localized_name: String,
    /// Granted permission strings.
    pub permissions: BTreeSet<String>,
}

impl Role {
    /// Create a role with a generated ID.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, localized_name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: RoleId::generate(),
            name: name.into(),
            localized_name: localized_name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the permission set carries the `all` sentinel.
    #[must_use]
    pub fn grants_all(&self) -> bool {
        self.permissions.contains(ALL_PERMISSIONS)
    }

    /// Whether the permission set contains `permission` verbatim.
    #[must_use]
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Input for creating a role.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    /// Machine name.
    pub name: String,
    /// Display name; defaults to `name`.
    #[serde(default)]
    pub localized_name: Option<String>,
    /// Granted permission strings.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl NewRole {
    /// Validate the input and build a role with a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a bad name or permission string.
    pub fn into_role(self) -> Result<Role, AuthError> {
        let name = validate_identifier("name", &self.name)?;
        let localized_name = match self.localized_name {
            Some(display) => sanitize_text("localized_name", &display, limits::MAX_SHORT_TEXT)?,
            None => name.clone(),
        };
        let permissions = self
            .permissions
            .iter()
            .map(|p| validate_permission(p).map(str::to_string))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Role {
            id: RoleId::generate(),
            name,
            localized_name,
            permissions,
        })
    }
}

/// Role store backed by sled.
#[derive(Clone)]
pub struct RoleStore {
    tree: sled::Tree,
}

impl RoleStore {
    /// Open the roles tree of an existing database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: &sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("roles")
            .map_err(|e| AuthError::Storage(format!("Failed to open roles tree: {e}")))?;

        Ok(Self { tree })
    }

    /// Check if any roles exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Create a role.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken, or a storage error.
    pub fn create(&self, role: &Role) -> Result<(), AuthError> {
        let index_key = format!("idx:name:{}", role.name);

        // Only one concurrent create can claim the name.
        let claimed = self
            .tree
            .compare_and_swap(
                index_key.as_bytes(),
                None as Option<&[u8]>,
                Some(role.id.0.as_bytes()),
            )
            .map_err(|e| AuthError::Storage(format!("Index error: {e}")))?;
        if claimed.is_err() {
            return Err(AuthError::AlreadyExists(format!("role {}", role.name)));
        }

        self.put(role)?;
        self.flush()
    }

    /// Get a role by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: &RoleId) -> Result<Option<Role>, AuthError> {
        match self.tree.get(id.0.as_bytes()) {
            Ok(Some(value)) => {
                let role: Role = serde_json::from_slice(&value)
                    .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
                Ok(Some(role))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Get error: {e}"))),
        }
    }

    /// Get a role by its machine name.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        let index_key = format!("idx:name:{name}");
        match self.tree.get(index_key.as_bytes()) {
            Ok(Some(id_bytes)) => {
                let id = RoleId::new(String::from_utf8_lossy(&id_bytes));
                self.get(&id)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Index lookup error: {e}"))),
        }
    }

    /// Replace the permission set of an existing role.
    ///
    /// # Errors
    ///
    /// Returns `RoleNotFound` if the role doesn't exist, or a storage error.
    pub fn set_permissions(
        &self,
        id: &RoleId,
        permissions: BTreeSet<String>,
    ) -> Result<Role, AuthError> {
        let mut role = self
            .get(id)?
            .ok_or_else(|| AuthError::RoleNotFound(id.0.clone()))?;
        role.permissions = permissions;
        self.put(&role)?;
        self.flush()?;
        Ok(role)
    }

    /// List all roles.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<Role>, AuthError> {
        let mut roles = Vec::new();

        for result in self.tree.iter() {
            let (key, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;

            // Skip index entries
            if key.starts_with(b"idx:") {
                continue;
            }

            let role: Role = serde_json::from_slice(&value)
                .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
            roles.push(role);
        }

        Ok(roles)
    }

    fn put(&self, role: &Role) -> Result<(), AuthError> {
        let value = serde_json::to_vec(role)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;

        self.tree
            .insert(role.id.0.as_bytes(), value)
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RoleStore {
        let db = sled::open(dir.path()).unwrap();
        RoleStore::with_db(&db).unwrap()
    }

    #[test]
    fn test_role_permissions() {
        let role = Role::new("leader", "Leader", ["persons.read", "persons.create"]);
        assert!(role.contains("persons.read"));
        assert!(!role.contains("persons"));
        assert!(!role.grants_all());

        let root = Role::new("superuser", "Superuser", [ALL_PERMISSIONS]);
        assert!(root.grants_all());
    }

    #[test]
    fn test_role_store() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.is_empty());

        let role = Role::new("leader", "Leader", ["persons.read"]);
        store.create(&role).unwrap();

        assert_eq!(store.get(&role.id).unwrap().unwrap(), role);
        assert_eq!(store.get_by_name("leader").unwrap().unwrap().id, role.id);
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.get(&RoleId::new("role_missing")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_role_name() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.create(&Role::new("leader", "Leader", ["a"])).unwrap();
        let result = store.create(&Role::new("leader", "Other", ["b"]));

        assert!(matches!(result, Err(AuthError::AlreadyExists(_))));
    }

    #[test]
    fn test_concurrent_creates_claim_name_once() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let barrier = std::sync::Barrier::new(8);

        let created = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        store.create(&Role::new("dup", format!("Dup {i}"), ["a"]))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(created, 1);
        let roles = store.list().unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(store.get_by_name("dup").unwrap().unwrap().id, roles[0].id);
    }

    #[test]
    fn test_set_permissions() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let role = Role::new("leader", "Leader", ["a"]);
        store.create(&role).unwrap();

        let updated = store
            .set_permissions(&role.id, ["b".to_string()].into_iter().collect())
            .unwrap();
        assert!(updated.contains("b"));
        assert!(!store.get(&role.id).unwrap().unwrap().contains("a"));

        assert!(matches!(
            store.set_permissions(&RoleId::new("nope"), BTreeSet::new()),
            Err(AuthError::RoleNotFound(_))
        ));
    }

    #[test]
    fn test_new_role_validation() {
        let role = NewRole {
            name: "coordinator".to_string(),
            localized_name: None,
            permissions: vec!["messages.read".to_string()],
        }
        .into_role()
        .unwrap();
        assert_eq!(role.localized_name, "coordinator");

        let bad = NewRole {
            name: "coordinator".to_string(),
            localized_name: None,
            permissions: vec!["messages read".to_string()],
        }
        .into_role();
        assert!(matches!(bad, Err(AuthError::Validation(_))));
    }
}
