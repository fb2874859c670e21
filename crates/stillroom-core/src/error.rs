//! Core error types for stillroom-core.
//!
//! Storage collaborators, configuration and payload validation each get their
//! own `thiserror` enum. [`CoreError`] wraps whatever can fail while wiring a
//! [`SessionManager`](crate::SessionManager) together.

use std::path::PathBuf;
use thiserror::Error;

use crate::actor::ActorIdError;

/// Core error type for stillroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage collaborator errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Anonymous actor token could not be read or created
    #[error("Actor id error: {0}")]
    ActorId(#[from] ActorIdError),
}

/// Errors raised by a [`SessionStore`](crate::storage::SessionStore).
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the SQLite database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Backend could not be reached (network or transport failure)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with a status the client does not handle
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Payload rejected before it was applied
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// True for failures that mean "the store is not reachable right now",
    /// as opposed to the store rejecting the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Locked | StorageError::OpenFailed { .. }
        )
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Required field missing or empty
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Fields that must agree with each other do not
    #[error("Inconsistent fields: {0}")]
    Inconsistent(String),
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Corrupt(err.to_string())
        } else {
            StorageError::Unavailable(err.to_string())
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
