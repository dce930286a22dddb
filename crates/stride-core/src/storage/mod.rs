//! Persistence layer: store trait, backends, and on-disk config.

mod config;
pub mod database;
pub mod store;

pub use config::Config;
pub use database::SqliteStore;
pub use store::{CommitUnit, MemoryStore, SessionStore};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/stride[-dev]/` based on STRIDE_ENV.
///
/// Set STRIDE_ENV=dev to use the development data directory. The
/// directory is created if missing.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STRIDE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("stride-dev")
    } else {
        base_dir.join("stride")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
