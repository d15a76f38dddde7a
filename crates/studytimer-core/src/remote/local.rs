use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

use super::{Finalization, SessionRecord, SessionRecordStore};
use crate::error::RemoteError;
use crate::storage::Database;

/// Record store backed by the local SQLite database.
pub struct LocalSessionStore {
    db: Mutex<Database>,
}

impl LocalSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, RemoteError> {
        self.db
            .lock()
            .map_err(|_| RemoteError::Store("session database poisoned".into()))
    }
}

#[async_trait]
impl SessionRecordStore for LocalSessionStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, RemoteError> {
        Ok(self.db()?.find_active_session(user_id)?)
    }

    async fn create_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RemoteError> {
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            started_at,
            ended_at: None,
            total_break_secs: 0,
            productivity: None,
            note: None,
        };
        self.db()?.insert_session(&record)?;
        Ok(record)
    }

    async fn patch_break_seconds(&self, id: &str, secs: u64) -> Result<(), RemoteError> {
        if !self.db()?.update_break(id, secs)? {
            tracing::debug!(session = id, "break patch matched no record");
        }
        Ok(())
    }

    async fn finalize_session(
        &self,
        id: &str,
        finalization: &Finalization,
    ) -> Result<(), RemoteError> {
        if !self.db()?.finalize_session(id, finalization)? {
            tracing::debug!(session = id, "finalize matched no record");
        }
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, RemoteError> {
        Ok(self.db()?.list_sessions(user_id)?)
    }
}
