//! External collaborator boundary.
//!
//! The engine consumes these traits; the session-type/tag catalogs and
//! the to-do subsystem live outside the core. [`MemoryCatalog`] is a
//! self-contained implementation used by tests and by the CLI before a
//! real backend is wired in.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Immutable session-type description resolved from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTypeSpec {
    pub work_duration_secs: u64,
    pub break_duration_secs: Option<u64>,
    pub number_of_cycles: Option<u32>,
    /// System entities are visible to everyone and never earn a
    /// first-use bonus.
    pub is_system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpec {
    pub is_system: bool,
}

/// Session-type catalog lookup with ownership/visibility enforcement.
pub trait SessionTypeCatalog: Send + Sync {
    fn resolve(&self, caller: Uuid, id: Uuid) -> Result<SessionTypeSpec>;
}

/// Tag lookup with ownership/visibility enforcement.
pub trait TagCatalog: Send + Sync {
    fn resolve(&self, caller: Uuid, id: Uuid) -> Result<TagSpec>;
}

/// The to-do subsystem's side of the boundary.
pub trait TodoDirectory: Send + Sync {
    /// Validate that the to-do exists and belongs to the caller.
    fn resolve(&self, caller: Uuid, id: Uuid) -> Result<()>;

    /// Report a completed work phase against a linked to-do. Whether the
    /// accumulated time triggers the to-do's own auto-completion (and
    /// its bonus) is entirely this subsystem's business.
    fn accumulate_work_duration(&self, todo_id: Uuid, user_id: Uuid, secs: u64) -> Result<()>;
}

#[derive(Default)]
struct MemoryCatalogInner {
    /// owner `None` marks a system entity.
    session_types: HashMap<Uuid, (Option<Uuid>, SessionTypeSpec)>,
    tags: HashMap<Uuid, Option<Uuid>>,
    /// owner and accumulated work seconds.
    todos: HashMap<Uuid, (Uuid, u64)>,
}

/// In-memory catalogs and to-do directory.
#[derive(Default)]
pub struct MemoryCatalog {
    inner: Mutex<MemoryCatalogInner>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session type; `owner` of `None` makes it a system type.
    pub fn add_session_type(
        &self,
        owner: Option<Uuid>,
        work_duration_secs: u64,
        break_duration_secs: Option<u64>,
        number_of_cycles: Option<u32>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let spec = SessionTypeSpec {
            work_duration_secs,
            break_duration_secs,
            number_of_cycles,
            is_system: owner.is_none(),
        };
        self.lock().session_types.insert(id, (owner, spec));
        id
    }

    /// Register a tag; `owner` of `None` makes it a system tag.
    pub fn add_tag(&self, owner: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().tags.insert(id, owner);
        id
    }

    pub fn add_todo(&self, owner: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().todos.insert(id, (owner, 0));
        id
    }

    /// Work seconds accumulated against a to-do so far.
    pub fn todo_accumulated_secs(&self, todo_id: Uuid) -> u64 {
        self.lock().todos.get(&todo_id).map(|(_, secs)| *secs).unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryCatalogInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionTypeCatalog for MemoryCatalog {
    fn resolve(&self, caller: Uuid, id: Uuid) -> Result<SessionTypeSpec> {
        let inner = self.lock();
        let (owner, spec) = inner
            .session_types
            .get(&id)
            .ok_or_else(|| EngineError::not_found("session type", id))?;
        match owner {
            Some(owner) if *owner != caller => {
                Err(EngineError::unauthorized(caller, "session type", id))
            }
            _ => Ok(*spec),
        }
    }
}

impl TagCatalog for MemoryCatalog {
    fn resolve(&self, caller: Uuid, id: Uuid) -> Result<TagSpec> {
        let inner = self.lock();
        let owner = inner
            .tags
            .get(&id)
            .ok_or_else(|| EngineError::not_found("tag", id))?;
        match owner {
            Some(owner) if *owner != caller => Err(EngineError::unauthorized(caller, "tag", id)),
            _ => Ok(TagSpec {
                is_system: owner.is_none(),
            }),
        }
    }
}

impl TodoDirectory for MemoryCatalog {
    fn resolve(&self, caller: Uuid, id: Uuid) -> Result<()> {
        let inner = self.lock();
        let (owner, _) = inner
            .todos
            .get(&id)
            .ok_or_else(|| EngineError::not_found("to-do", id))?;
        if *owner != caller {
            return Err(EngineError::unauthorized(caller, "to-do", id));
        }
        Ok(())
    }

    fn accumulate_work_duration(&self, todo_id: Uuid, user_id: Uuid, secs: u64) -> Result<()> {
        let mut inner = self.lock();
        let (owner, accumulated) = inner
            .todos
            .get_mut(&todo_id)
            .ok_or_else(|| EngineError::not_found("to-do", todo_id))?;
        if *owner != user_id {
            return Err(EngineError::unauthorized(user_id, "to-do", todo_id));
        }
        *accumulated += secs;
        Ok(())
    }
}
