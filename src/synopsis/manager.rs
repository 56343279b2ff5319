//! SynopsisManager: owns the store and the turn engine, serializes turns
//! per session and persists their results.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{DatabaseError, DocumentError, Error};
use crate::store::SessionStore;

use super::document::{DocumentRef, DocumentRenderer, SynopsisDocument};
use super::model::{DialogueTurn, Profile, SessionFlags, SessionRecord};
use super::progress::ProgressReport;
use super::research::ResearchPayload;
use super::turn::{TurnEngine, TurnResponse};

/// Re-runs of a turn after a lost replace-or-reject race.
const MAX_CONFLICT_RETRIES: usize = 2;

/// Progress plus gate status for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub progress: ProgressReport,
    pub generation_unlocked: bool,
    pub sections_needed: usize,
    pub flags: SessionFlags,
}

/// What a client needs to restore a session view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub profile: Profile,
    pub display: Vec<DialogueTurn>,
    pub research: Option<ResearchPayload>,
    #[serde(flatten)]
    pub status: SessionStatus,
}

type LockMap = HashMap<String, Arc<Mutex<()>>>;

/// Per-session turn locks. An entry lives only while some caller holds a
/// lease on it.
#[derive(Default)]
struct SessionLocks {
    locks: std::sync::Mutex<LockMap>,
}

impl SessionLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lease(&self, session_id: &str) -> SessionLease<'_> {
        let lock = self.map().entry(session_id.to_string()).or_default().clone();
        SessionLease {
            locks: self,
            session_id: session_id.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

/// A registered interest in one session's lock. Dropping the last lease
/// removes the entry, including when the holder was cancelled mid-wait.
struct SessionLease<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    lock: Arc<Mutex<()>>,
}

impl SessionLease<'_> {
    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.map();
        // Only the map entry and this lease still reference the lock
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.session_id);
        }
    }
}

pub struct SynopsisManager {
    store: Arc<dyn SessionStore>,
    engine: TurnEngine,
    renderer: Arc<dyn DocumentRenderer>,
    locks: SessionLocks,
}

impl SynopsisManager {
    pub fn new(store: Arc<dyn SessionStore>, engine: TurnEngine, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self {
            store,
            engine,
            renderer,
            locks: SessionLocks::default(),
        }
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        Ok(self
            .store
            .load(session_id)
            .await?
            .map(|stored| SessionRecord::from_stored(&stored)))
    }

    async fn load_or_default(&self, session_id: &str) -> Result<SessionRecord, DatabaseError> {
        Ok(self
            .load(session_id)
            .await?
            .unwrap_or_else(|| SessionRecord::new(session_id)))
    }

    /// Process one user utterance.
    ///
    /// `client_profile` only seeds a session the store has never seen; once
    /// a record exists the stored profile wins.
    pub async fn process_turn(
        &self,
        session_id: &str,
        utterance: &str,
        client_profile: Option<&serde_json::Value>,
    ) -> Result<TurnResponse, Error> {
        let lease = self.locks.lease(session_id);
        let _guard = lease.lock().await;

        let mut attempt = 0;
        loop {
            let record = match self.load(session_id).await? {
                Some(record) => record,
                None => SessionRecord {
                    profile: Profile::from_client_value(client_profile),
                    ..SessionRecord::new(session_id)
                },
            };

            let outcome = self.engine.run(record, utterance).await;
            let stored = outcome
                .record
                .to_stored()
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

            match self.store.save(&stored).await {
                Ok(_) => return Ok(outcome.response),
                Err(DatabaseError::Conflict { expected, found, .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(
                        session_id = %session_id,
                        expected,
                        found,
                        attempt,
                        "Session changed underneath turn, re-running"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn status(&self, record: &SessionRecord) -> SessionStatus {
        let progress = self.engine.tracker().report(&record.profile);
        let gate = self.engine.gate();
        SessionStatus {
            session_id: record.session_id.clone(),
            generation_unlocked: gate.generation_unlocked(&progress),
            sections_needed: gate.sections_needed(&progress),
            flags: record.flags,
            progress,
        }
    }

    pub async fn progress(&self, session_id: &str) -> Result<SessionStatus, Error> {
        let record = self.load_or_default(session_id).await?;
        Ok(self.status(&record))
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionView, Error> {
        let record = self.load_or_default(session_id).await?;
        let status = self.status(&record);
        Ok(SessionView {
            profile: record.profile,
            display: record.display,
            research: record.research,
            status,
        })
    }

    /// Clear everything stored for a session. Returns `true` if it existed.
    ///
    /// The stored revision keeps counting up, so a turn computed before the
    /// reset can never be saved over it.
    pub async fn reset(&self, session_id: &str) -> Result<bool, Error> {
        let lease = self.locks.lease(session_id);
        let _guard = lease.lock().await;
        let existed = self.store.reset(session_id).await?;
        info!(session_id = %session_id, existed, "Session reset");
        Ok(existed)
    }

    /// Assemble and render the synopsis, if the gate allows it.
    pub async fn generate_document(&self, session_id: &str) -> Result<DocumentRef, Error> {
        let record = self.load_or_default(session_id).await?;
        let status = self.status(&record);
        if !status.generation_unlocked {
            return Err(DocumentError::Locked {
                filled: status.progress.filled_count,
                required: self.engine.gate().unlock_threshold(),
            }
            .into());
        }

        let document = SynopsisDocument::assemble(&record.profile, record.research.as_ref());
        Ok(self.renderer.render(session_id, &document).await?)
    }

    /// Path of a previously generated document.
    pub fn locate_document(&self, filename: &str) -> Result<PathBuf, Error> {
        Ok(self.renderer.locate(filename)?)
    }
}
