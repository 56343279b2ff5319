//! `SessionStore` trait: single async interface for session persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// A session as persisted: one JSON text column per piece of state.
///
/// Columns are decoded independently by `SessionRecord::from_stored`, so a
/// corrupt column never takes the whole session down with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub session_id: String,
    /// Revision the caller loaded. 0 means the session has never been saved.
    pub revision: u64,
    pub profile: String,
    pub history: String,
    pub display: String,
    pub flags: String,
    pub research: Option<String>,
}

impl StoredSession {
    /// A session with every piece cleared, as left behind by a reset.
    pub fn cleared(session_id: impl Into<String>, revision: u64) -> Self {
        Self {
            session_id: session_id.into(),
            revision,
            profile: "{}".to_string(),
            history: "[]".to_string(),
            display: "[]".to_string(),
            flags: "{}".to_string(),
            research: None,
        }
    }
}

/// Backend-agnostic session persistence with replace-or-reject writes.
///
/// Rows are never removed, so a revision number is never handed out twice
/// for the same session. A writer holding a pre-reset revision always loses.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, or `None` if it was never saved.
    async fn load(&self, session_id: &str) -> Result<Option<StoredSession>, DatabaseError>;

    /// Save a session if the stored revision still equals `session.revision`.
    ///
    /// Returns the new revision. A stale revision fails with
    /// `DatabaseError::Conflict` and leaves the stored row untouched.
    async fn save(&self, session: &StoredSession) -> Result<u64, DatabaseError>;

    /// Clear every piece of a session and bump its revision.
    ///
    /// Returns `true` if the session existed. Unknown sessions are left
    /// unsaved.
    async fn reset(&self, session_id: &str) -> Result<bool, DatabaseError>;
}
