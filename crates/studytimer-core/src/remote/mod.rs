//! Session record stores.
//!
//! The timer keeps one record per study session in a record store. The
//! local backend writes to the SQLite database; the HTTP backend talks to a
//! PostgREST-style endpoint. Callers treat every failure as non-fatal.

mod http;
mod local;

pub use http::HttpSessionStore;
pub use local::LocalSessionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::error::RemoteError;
use crate::score::Score;
use crate::storage::{Config, Database, RemoteBackend};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_break_secs: u64,
    #[serde(default)]
    pub productivity: Option<u8>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Nullable integer columns come back as JSON `null`.
fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Final values written when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalization {
    pub productivity: Score,
    pub note: String,
    pub ended_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionRecordStore: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Most recently started record for `user_id` that has not ended.
    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, RemoteError>;

    async fn create_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RemoteError>;

    async fn patch_break_seconds(&self, id: &str, secs: u64) -> Result<(), RemoteError>;

    async fn finalize_session(
        &self,
        id: &str,
        finalization: &Finalization,
    ) -> Result<(), RemoteError>;

    /// All records for `user_id`, newest first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, RemoteError>;
}

/// Build the record store selected by `config.remote.backend`.
///
/// # Errors
/// Returns an error if the local database cannot be opened or the HTTP
/// backend is missing its base URL.
pub fn from_config(config: &Config) -> crate::Result<Arc<dyn SessionRecordStore>> {
    match config.remote.backend {
        RemoteBackend::Local => Ok(Arc::new(LocalSessionStore::new(Database::open()?))),
        RemoteBackend::Http => {
            let base_url = config.remote.base_url.as_deref().ok_or_else(|| {
                crate::error::ConfigError::MissingKey("remote.base_url".to_string())
            })?;
            let store = HttpSessionStore::new(
                base_url,
                config.remote.api_key.clone(),
                config.remote.access_token.clone(),
            )?;
            Ok(Arc::new(store))
        }
    }
}
