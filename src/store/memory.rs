//! In-memory session store, for tests and `SYNOPSIS_STORE=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::{SessionStore, StoredSession};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<StoredSession>, DatabaseError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session: &StoredSession) -> Result<u64, DatabaseError> {
        let mut sessions = self.sessions.write().await;
        let found = sessions.get(&session.session_id).map_or(0, |s| s.revision);
        if found != session.revision {
            return Err(DatabaseError::Conflict {
                session_id: session.session_id.clone(),
                expected: session.revision,
                found,
            });
        }
        let next = found + 1;
        sessions.insert(
            session.session_id.clone(),
            StoredSession {
                revision: next,
                ..session.clone()
            },
        );
        Ok(next)
    }

    async fn reset(&self, session_id: &str) -> Result<bool, DatabaseError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(stored) => {
                *stored = StoredSession::cleared(session_id, stored.revision + 1);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, revision: u64) -> StoredSession {
        StoredSession {
            session_id: id.to_string(),
            revision,
            profile: r#"{"title":"Smart bins"}"#.to_string(),
            history: "[]".to_string(),
            display: "[]".to_string(),
            flags: "{}".to_string(),
            research: None,
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = InMemorySessionStore::new();
        assert!(store.load("a").await.unwrap().is_none());
        assert_eq!(store.save(&session("a", 0)).await.unwrap(), 1);
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.profile, r#"{"title":"Smart bins"}"#);
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let store = InMemorySessionStore::new();
        store.save(&session("a", 0)).await.unwrap();
        store.save(&session("a", 1)).await.unwrap();

        let err = store.save(&session("a", 1)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { expected: 1, found: 2, .. }));
        // A second "new" insert for an existing session also conflicts
        assert!(store.save(&session("a", 0)).await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_and_bumps_revision() {
        let store = InMemorySessionStore::new();
        assert!(!store.reset("a").await.unwrap());
        assert!(store.load("a").await.unwrap().is_none());

        store.save(&session("a", 0)).await.unwrap();
        assert!(store.reset("a").await.unwrap());
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded, StoredSession::cleared("a", 2));
    }

    #[tokio::test]
    async fn stale_save_after_reset_conflicts() {
        let store = InMemorySessionStore::new();
        store.save(&session("a", 0)).await.unwrap();
        let before_reset = store.load("a").await.unwrap().unwrap();

        store.reset("a").await.unwrap();
        let mut fresh = store.load("a").await.unwrap().unwrap();
        fresh.profile = r#"{"title":"After reset"}"#.to_string();
        assert_eq!(store.save(&fresh).await.unwrap(), 3);

        let err = store.save(&before_reset).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { expected: 1, found: 3, .. }));
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.profile, r#"{"title":"After reset"}"#);
    }
}
