//! libSQL backend: async `SessionStore` implementation.
//!
//! Supports local file and in-memory databases. Writes are replace-or-reject
//! on the `revision` column.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{SessionStore, StoredSession};

/// libSQL session store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlSessionStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlSessionStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Session database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Current stored revision, 0 if the row doesn't exist.
    async fn current_revision(&self, session_id: &str) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT revision FROM sessions WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("current_revision: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("current_revision: {e}"))),
        }
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn row_to_session(row: &libsql::Row) -> Result<StoredSession, libsql::Error> {
    Ok(StoredSession {
        session_id: row.get(0)?,
        revision: row.get::<i64>(1)? as u64,
        profile: row.get::<String>(2).unwrap_or_default(),
        history: row.get::<String>(3).unwrap_or_default(),
        display: row.get::<String>(4).unwrap_or_default(),
        flags: row.get::<String>(5).unwrap_or_default(),
        research: row.get::<String>(6).ok(),
    })
}

#[async_trait]
impl SessionStore for LibSqlSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<StoredSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT session_id, revision, profile, history, display, flags, research \
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_session(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("load_session row: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_session: {e}"))),
        }
    }

    async fn save(&self, session: &StoredSession) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let expected = session.revision;
        let next = expected + 1;

        let affected = if expected == 0 {
            conn.execute(
                "INSERT INTO sessions \
                 (session_id, revision, profile, history, display, flags, research, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
                 ON CONFLICT(session_id) DO NOTHING",
                params![
                    session.session_id.as_str(),
                    next as i64,
                    session.profile.as_str(),
                    session.history.as_str(),
                    session.display.as_str(),
                    session.flags.as_str(),
                    opt_text(session.research.as_deref()),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_session: {e}")))?
        } else {
            conn.execute(
                "UPDATE sessions SET revision = ?1, profile = ?2, history = ?3, display = ?4, \
                 flags = ?5, research = ?6, updated_at = ?7 \
                 WHERE session_id = ?8 AND revision = ?9",
                params![
                    next as i64,
                    session.profile.as_str(),
                    session.history.as_str(),
                    session.display.as_str(),
                    session.flags.as_str(),
                    opt_text(session.research.as_deref()),
                    now,
                    session.session_id.as_str(),
                    expected as i64
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_session: {e}")))?
        };

        if affected == 0 {
            let found = self.current_revision(&session.session_id).await?;
            return Err(DatabaseError::Conflict {
                session_id: session.session_id.clone(),
                expected,
                found,
            });
        }

        debug!(session_id = %session.session_id, revision = next, "Session saved");
        Ok(next)
    }

    async fn reset(&self, session_id: &str) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE sessions SET revision = revision + 1, profile = '{}', history = '[]', \
                 display = '[]', flags = '{}', research = NULL, updated_at = ?2 \
                 WHERE session_id = ?1",
                params![session_id, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("reset_session: {e}")))?;

        if count > 0 {
            info!(session_id = %session_id, "Session reset");
        }
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlSessionStore {
        LibSqlSessionStore::new_memory().await.unwrap()
    }

    fn session(id: &str, revision: u64) -> StoredSession {
        StoredSession {
            session_id: id.to_string(),
            revision,
            profile: r#"{"title":"Crop disease detection"}"#.to_string(),
            history: r#"[{"role":"user","content":"hi"}]"#.to_string(),
            display: r#"[{"role":"user","content":"hi"}]"#.to_string(),
            flags: r#"{"ready_notice_shown":false,"auto_research_done":true}"#.to_string(),
            research: None,
        }
    }

    #[tokio::test]
    async fn insert_and_load() {
        let db = test_db().await;
        assert!(db.load("s1").await.unwrap().is_none());

        assert_eq!(db.save(&session("s1", 0)).await.unwrap(), 1);
        let loaded = db.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.profile, r#"{"title":"Crop disease detection"}"#);
        assert!(loaded.research.is_none());
    }

    #[tokio::test]
    async fn update_bumps_revision_and_keeps_research() {
        let db = test_db().await;
        db.save(&session("s1", 0)).await.unwrap();

        let mut next = session("s1", 1);
        next.research = Some(r#"{"query":"x"}"#.to_string());
        assert_eq!(db.save(&next).await.unwrap(), 2);

        let loaded = db.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 2);
        assert_eq!(loaded.research.as_deref(), Some(r#"{"query":"x"}"#));
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let db = test_db().await;
        db.save(&session("s1", 0)).await.unwrap();
        db.save(&session("s1", 1)).await.unwrap();

        let mut stale = session("s1", 1);
        stale.profile = "{}".to_string();
        let err = db.save(&stale).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { expected: 1, found: 2, .. }));

        // Stored row is untouched
        let loaded = db.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.profile, r#"{"title":"Crop disease detection"}"#);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let db = test_db().await;
        db.save(&session("s1", 0)).await.unwrap();
        let err = db.save(&session("s1", 0)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { expected: 0, found: 1, .. }));
    }

    #[tokio::test]
    async fn reset_clears_row_and_bumps_revision() {
        let db = test_db().await;
        assert!(!db.reset("s1").await.unwrap());
        assert!(db.load("s1").await.unwrap().is_none());

        let mut saved = session("s1", 0);
        saved.research = Some(r#"{"query":"x"}"#.to_string());
        db.save(&saved).await.unwrap();
        assert!(db.reset("s1").await.unwrap());

        let loaded = db.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded, StoredSession::cleared("s1", 2));
    }

    #[tokio::test]
    async fn stale_save_after_reset_conflicts() {
        let db = test_db().await;
        let mut old = session("s1", 0);
        old.profile = r#"{"title":"old","conclusion":"pre-reset data"}"#.to_string();
        db.save(&old).await.unwrap();
        let before_reset = db.load("s1").await.unwrap().unwrap();

        db.reset("s1").await.unwrap();
        let mut fresh = db.load("s1").await.unwrap().unwrap();
        fresh.profile = r#"{"title":"new"}"#.to_string();
        assert_eq!(db.save(&fresh).await.unwrap(), 3);

        let err = db.save(&before_reset).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { expected: 1, found: 3, .. }));
        let loaded = db.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.profile, r#"{"title":"new"}"#);
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        {
            let db = LibSqlSessionStore::new_local(&path).await.unwrap();
            db.save(&session("s1", 0)).await.unwrap();
        }
        let db = LibSqlSessionStore::new_local(&path).await.unwrap();
        let loaded = db.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
    }
}
