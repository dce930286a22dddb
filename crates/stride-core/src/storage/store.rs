//! Durable-store boundary and the in-memory reference implementation.
//!
//! An engine call computes every mutation in memory first, then hands
//! the store one [`CommitUnit`]. The store applies the unit atomically:
//! either all of it becomes visible to subsequent reads or none of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::error::StorageError;
use crate::scoring::UserAccount;
use crate::session::FocusSession;
use crate::streak::UserStats;
use crate::usage::{EntityKind, UsageRecord};

/// Everything one engine call dirtied. Committed all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct CommitUnit {
    pub session: Option<FocusSession>,
    pub user: Option<UserAccount>,
    pub stats: Option<UserStats>,
    pub usage: Vec<UsageRecord>,
}

impl CommitUnit {
    pub fn is_empty(&self) -> bool {
        self.session.is_none() && self.user.is_none() && self.stats.is_none() && self.usage.is_empty()
    }
}

/// Transactional load/save of the engine's entities.
pub trait SessionStore: Send + Sync {
    fn load_session(&self, id: Uuid) -> Result<Option<FocusSession>, StorageError>;

    /// The single session currently in Working/Break for the user.
    fn ongoing_session(&self, user_id: Uuid) -> Result<Option<FocusSession>, StorageError>;

    fn load_user(&self, id: Uuid) -> Result<Option<UserAccount>, StorageError>;

    fn load_stats(&self, user_id: Uuid) -> Result<Option<UserStats>, StorageError>;

    fn load_usage(
        &self,
        user_id: Uuid,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Option<UsageRecord>, StorageError>;

    /// Apply a commit unit atomically.
    fn commit(&self, unit: &CommitUnit) -> Result<(), StorageError>;
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<Uuid, FocusSession>,
    users: HashMap<Uuid, UserAccount>,
    stats: HashMap<Uuid, UserStats>,
    usage: HashMap<(Uuid, EntityKind, Uuid), UsageRecord>,
}

/// In-memory store for tests.
///
/// A single mutex makes commits trivially atomic; `fail_next_commit`
/// injects a persistence failure to exercise the all-or-nothing
/// contract.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` call fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemoryStore {
    fn load_session(&self, id: Uuid) -> Result<Option<FocusSession>, StorageError> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    fn ongoing_session(&self, user_id: Uuid) -> Result<Option<FocusSession>, StorageError> {
        Ok(self
            .lock()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && !s.status.is_terminal())
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    fn load_user(&self, id: Uuid) -> Result<Option<UserAccount>, StorageError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn load_stats(&self, user_id: Uuid) -> Result<Option<UserStats>, StorageError> {
        Ok(self.lock().stats.get(&user_id).cloned())
    }

    fn load_usage(
        &self,
        user_id: Uuid,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Option<UsageRecord>, StorageError> {
        Ok(self
            .lock()
            .usage
            .get(&(user_id, entity_kind, entity_id))
            .cloned())
    }

    fn commit(&self, unit: &CommitUnit) -> Result<(), StorageError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::QueryFailed("injected commit failure".into()));
        }

        let mut inner = self.lock();
        if let Some(session) = &unit.session {
            inner.sessions.insert(session.id, session.clone());
        }
        if let Some(user) = &unit.user {
            inner.users.insert(user.id, user.clone());
        }
        if let Some(stats) = &unit.stats {
            inner.stats.insert(stats.user_id, stats.clone());
        }
        for record in &unit.usage {
            inner.usage.insert(
                (record.user_id, record.entity_kind, record.entity_id),
                record.clone(),
            );
        }
        Ok(())
    }
}
