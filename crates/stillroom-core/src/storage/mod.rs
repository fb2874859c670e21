mod api;
mod config;
pub mod database;
mod memory;

pub use api::ApiStore;
pub use config::{ClientConfig, Config, ServerConfig, StorageBackend, StorageConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::actor::ActorKey;
use crate::error::{ConfigError, StorageError};
use crate::session::{NewSession, Session, SessionPatch};
use crate::settings::{SettingsPatch, UserSettings};

/// Persistence collaborator for sessions and settings.
///
/// Not-found is reported as `Ok(None)` / `Ok(false)`, never as an error.
/// Implementations are last-write-wins per record.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, new: NewSession) -> Result<Session, StorageError>;

    fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError>;

    /// The actor's sessions, most recent `started_at` first.
    fn list_sessions(&self, actor: &ActorKey) -> Result<Vec<Session>, StorageError>;

    fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>, StorageError>;

    fn delete_session(&self, id: &str) -> Result<bool, StorageError>;

    /// The actor's settings, or defaults when none were ever saved.
    fn get_settings(&self, actor: &ActorKey) -> Result<UserSettings, StorageError>;

    /// Create the actor's settings record on first write, update it after.
    fn upsert_settings(
        &self,
        actor: &ActorKey,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, StorageError>;
}

pub(crate) fn sort_recent_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
}

/// Returns `~/.config/stillroom[-dev]/` based on STILLROOM_ENV.
///
/// Set STILLROOM_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STILLROOM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("stillroom-dev")
    } else {
        base_dir.join("stillroom")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Open the store selected by `config`.
///
/// A non-empty `client.api_base_url` wins; otherwise `storage.backend`
/// picks between an in-memory store and the SQLite file in the data dir.
///
/// # Errors
/// Returns an error if the backend cannot be opened.
pub fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>, StorageError> {
    if !config.client.api_base_url.trim().is_empty() {
        let store = ApiStore::new(
            &config.client.api_base_url,
            Duration::from_secs(config.client.timeout_secs),
        )?;
        tracing::debug!(base_url = %store.base_url(), "using remote session store");
        return Ok(Arc::new(store));
    }

    open_backend(&config.storage)
}

/// Open the local backend named by `storage`, ignoring any remote client
/// settings. This is what the server itself persists to.
///
/// # Errors
/// Returns an error if the SQLite file cannot be opened.
pub fn open_backend(storage: &StorageConfig) -> Result<Arc<dyn SessionStore>, StorageError> {
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let dir = data_dir().map_err(|e| StorageError::Unavailable(e.to_string()))?;
            let path = dir.join(&storage.database_file);
            let db = Database::open_at(path)?;
            tracing::debug!(path = ?db.path(), "using sqlite session store");
            Ok(Arc::new(db))
        }
    }
}
