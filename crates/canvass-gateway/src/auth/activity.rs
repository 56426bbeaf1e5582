//! Append-only log of authentication events.

use canvass_core::UserId;
use canvass_core::validation::limits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Logged auth event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// Successful login.
    Login,
    /// Rejected login attempt.
    LoginFailed,
    /// Logout.
    Logout,
    /// New user account.
    UserCreated,
    /// New role.
    RoleCreated,
}

/// One activity log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Monotonic entry ID.
    pub id: u64,
    /// When the event happened.
    pub at: DateTime<Utc>,
    /// Acting user, when known.
    pub actor: Option<UserId>,
    /// What happened.
    pub action: ActivityAction,
    /// Free-form detail (target email, role name, ...), at most
    /// `MAX_SHORT_TEXT` characters with control characters removed.
    pub detail: String,
}

/// Activity log backed by a sled tree keyed by big-endian sequence number.
pub struct ActivityLog {
    db: sled::Db,
    tree: sled::Tree,
}

impl ActivityLog {
    /// Open the activity tree of an existing database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: &sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("activity")
            .map_err(|e| AuthError::Storage(format!("Failed to open activity tree: {e}")))?;

        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    /// Append an entry. Over-long details are cut short.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn record(
        &self,
        actor: Option<&UserId>,
        action: ActivityAction,
        detail: impl Into<String>,
    ) -> Result<ActivityEntry, AuthError> {
        let id = self
            .db
            .generate_id()
            .map_err(|e| AuthError::Storage(format!("Id generation error: {e}")))?;
        let detail: String = detail.into();
        let entry = ActivityEntry {
            id,
            at: Utc::now(),
            actor: actor.cloned(),
            action,
            detail: clip(&detail),
        };

        let value = serde_json::to_vec(&entry)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;
        self.tree
            .insert(id.to_be_bytes(), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;

        Ok(entry)
    }

    /// Record an entry, logging instead of failing.
    pub fn note(&self, actor: Option<&UserId>, action: ActivityAction, detail: impl Into<String>) {
        if let Err(e) = self.record(actor, action, detail) {
            tracing::warn!(error = %e, ?action, "Failed to record activity");
        }
    }

    /// The newest `limit` entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, AuthError> {
        self.tree
            .iter()
            .rev()
            .take(limit)
            .map(|result| {
                let (_, value) =
                    result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;
                serde_json::from_slice(&value)
                    .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))
            })
            .collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn clip(detail: &str) -> String {
    detail
        .chars()
        .filter(|c| !c.is_control())
        .take(limits::MAX_SHORT_TEXT)
        .collect()
}
