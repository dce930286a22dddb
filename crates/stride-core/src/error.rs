//! Core error types for stride-core.
//!
//! This module defines the error hierarchy using thiserror. The four
//! domain variants (`InvalidArgument`, `NotFound`, `Unauthorized`,
//! `InvalidOperation`) are recoverable at the caller's boundary and map
//! to caller-visible rejections; storage failures wrap the backend.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Core error type for stride-core.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed request (e.g. both or neither duration source supplied)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not resolve
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Caller is not the owner of the referenced entity
    #[error("user {caller} is not authorized for {entity} {id}")]
    Unauthorized {
        caller: Uuid,
        entity: &'static str,
        id: String,
    },

    /// Operation is not valid for the entity's current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Storage-related errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("database is locked")]
    Locked,

    /// A stored row could not be decoded back into a domain entity.
    /// This indicates a data-integrity bug upstream, not a user error.
    #[error("corrupt record in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    /// Configuration file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(caller: Uuid, entity: &'static str, id: Uuid) -> Self {
        EngineError::Unauthorized {
            caller,
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
