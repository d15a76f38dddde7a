mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, IdentityConfig, LoggingConfig, RemoteBackend, RemoteConfig, TimerConfig};
pub use database::Database;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{DatabaseError, Result};

/// Returns `~/.config/studytimer[-dev]/` based on STUDYTIMER_ENV.
///
/// Set STUDYTIMER_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STUDYTIMER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("studytimer-dev")
    } else {
        base_dir.join("studytimer")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Synchronous string key-value surface that timer state is persisted to.
pub trait KvStore: Send {
    fn kv_get(&self, key: &str) -> Result<Option<String>>;
    fn kv_set(&self, key: &str, value: &str) -> Result<()>;
    fn kv_delete(&self, key: &str) -> Result<()>;
}

/// Typed JSON access on top of any [`KvStore`].
pub trait PersistExt: KvStore {
    /// Read and decode `key`, falling back to `default` when it is missing
    /// or does not decode.
    fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.kv_get(key) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding undecodable persisted value");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read persisted value");
                default
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.kv_set(key, &json)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.kv_delete(key)
    }
}

impl<S: KvStore + ?Sized> PersistExt for S {}

/// In-process [`KvStore`]. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| DatabaseError::Poisoned.into())
    }
}

impl KvStore for MemoryKv {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn kv_delete(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}
