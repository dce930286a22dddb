//! # Stride Core Library
//!
//! Core business logic for Stride, a focus-session tracker with a
//! gamified reward loop. All operations are available through this
//! library; the CLI binary is a thin layer over the same engine.
//!
//! ## Architecture
//!
//! - **Session Engine**: a wall-clock-driven state machine; callers ask
//!   it to advance and it folds elapsed time into the session
//! - **Scoring**: completed sessions, first uses, and to-do completions
//!   earn Steps and Stepstones through one shared award routine
//! - **Streaks**: consecutive-day tracking fed by qualifying work phases
//! - **Storage**: SQLite-backed store committing each engine call as a
//!   single transaction, plus TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: session lifecycle orchestration
//! - [`ScoringEngine`]: award calculation and currency mutation
//! - [`SqliteStore`]: persistence and local catalogs
//! - [`Config`]: scoring/streak configuration management

pub mod catalog;
pub mod error;
pub mod events;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod streak;
pub mod usage;

pub use catalog::{MemoryCatalog, SessionTypeCatalog, SessionTypeSpec, TagCatalog, TagSpec, TodoDirectory};
pub use error::{EngineError, Result, StorageError};
pub use events::{Event, EventBus, EventSink};
pub use scoring::{AwardResult, Consumable, ScoreTable, ScoringEngine, UserAccount};
pub use session::{FocusSession, SessionConfig, SessionEngine, SessionStatus};
pub use storage::{CommitUnit, Config, MemoryStore, SessionStore, SqliteStore};
pub use streak::{StreakTracker, UserStats};
pub use usage::{EntityKind, UsageRecord};
