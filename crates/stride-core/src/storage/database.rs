//! SQLite-backed store.
//!
//! Persists focus sessions, user accounts, per-user stats, and usage
//! records, and doubles as the local session-type/tag catalog and
//! to-do directory for single-machine deployments. Commit units are
//! applied inside a single SQLite transaction.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::catalog::{SessionTypeCatalog, SessionTypeSpec, TagCatalog, TagSpec, TodoDirectory};
use crate::error::{EngineError, Result as EngineResult, StorageError};
use crate::scoring::UserAccount;
use crate::session::{FocusSession, SessionConfig, SessionStatus};
use crate::storage::{data_dir, CommitUnit, SessionStore};
use crate::streak::UserStats;
use crate::usage::{EntityKind, UsageRecord};

/// SQLite database for engine state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `~/.config/stride/stride.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        Self::open_at(data_dir()?.join("stride.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl Into<std::path::PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.lock()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id               TEXT PRIMARY KEY,
                    user_id          TEXT NOT NULL,
                    config           TEXT NOT NULL,
                    status           TEXT NOT NULL,
                    phase_started_at TEXT NOT NULL,
                    phase_ends_at    TEXT NOT NULL,
                    completed_cycles INTEGER NOT NULL,
                    total_work_secs  INTEGER NOT NULL,
                    total_break_secs INTEGER NOT NULL,
                    started_at       TEXT NOT NULL,
                    ended_at         TEXT,
                    todo_id          TEXT,
                    tag_ids          TEXT NOT NULL,
                    focus_level      INTEGER,
                    notes            TEXT
                );

                CREATE TABLE IF NOT EXISTS users (
                    id                TEXT PRIMARY KEY,
                    total_steps       INTEGER NOT NULL,
                    stepstones        INTEGER NOT NULL,
                    compass_active    INTEGER NOT NULL,
                    energy_bar_active INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_stats (
                    user_id                  TEXT PRIMARY KEY,
                    current_streak_days      INTEGER NOT NULL,
                    longest_streak_days      INTEGER NOT NULL,
                    last_completion_date     TEXT,
                    total_completed_sessions INTEGER NOT NULL,
                    total_focus_secs         INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS usage_records (
                    user_id                 TEXT NOT NULL,
                    entity_kind             TEXT NOT NULL,
                    entity_id               TEXT NOT NULL,
                    awarded_first_use_bonus INTEGER NOT NULL,
                    score                   REAL NOT NULL,
                    last_used_at            TEXT NOT NULL,
                    PRIMARY KEY (user_id, entity_kind, entity_id)
                );

                CREATE TABLE IF NOT EXISTS session_types (
                    id                  TEXT PRIMARY KEY,
                    owner_id            TEXT,
                    work_duration_secs  INTEGER NOT NULL,
                    break_duration_secs INTEGER,
                    number_of_cycles    INTEGER
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id       TEXT PRIMARY KEY,
                    owner_id TEXT,
                    name     TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS todos (
                    id                    TEXT PRIMARY KEY,
                    owner_id              TEXT NOT NULL,
                    title                 TEXT NOT NULL,
                    accumulated_work_secs INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_user_status ON sessions(user_id, status);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Catalog management ───────────────────────────────────────────

    pub fn add_session_type(
        &self,
        owner: Option<Uuid>,
        work_duration_secs: u64,
        break_duration_secs: Option<u64>,
        number_of_cycles: Option<u32>,
    ) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        self.lock().execute(
            "INSERT INTO session_types (id, owner_id, work_duration_secs, break_duration_secs, number_of_cycles)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                owner.map(|o| o.to_string()),
                work_duration_secs,
                break_duration_secs,
                number_of_cycles,
            ],
        )?;
        Ok(id)
    }

    pub fn add_tag(&self, owner: Option<Uuid>, name: &str) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        self.lock().execute(
            "INSERT INTO tags (id, owner_id, name) VALUES (?1, ?2, ?3)",
            params![id.to_string(), owner.map(|o| o.to_string()), name],
        )?;
        Ok(id)
    }

    pub fn add_todo(&self, owner: Uuid, title: &str) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        self.lock().execute(
            "INSERT INTO todos (id, owner_id, title, accumulated_work_secs) VALUES (?1, ?2, ?3, 0)",
            params![id.to_string(), owner.to_string(), title],
        )?;
        Ok(id)
    }

    /// Every session type visible to the caller (system plus own).
    pub fn list_session_types(
        &self,
        caller: Uuid,
    ) -> Result<Vec<(Uuid, SessionTypeSpec)>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, work_duration_secs, break_duration_secs, number_of_cycles
             FROM session_types WHERE owner_id IS NULL OR owner_id = ?1",
        )?;
        let rows = stmt.query_map(params![caller.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, Option<u64>>(3)?,
                row.get::<_, Option<u32>>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, owner, work, brk, cycles) = row?;
            out.push((
                parse_uuid("session_types", &id)?,
                SessionTypeSpec {
                    work_duration_secs: work,
                    break_duration_secs: brk,
                    number_of_cycles: cycles,
                    is_system: owner.is_none(),
                },
            ));
        }
        Ok(out)
    }

    /// Every tag visible to the caller: (id, name, is_system).
    pub fn list_tags(&self, caller: Uuid) -> Result<Vec<(Uuid, String, bool)>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name FROM tags WHERE owner_id IS NULL OR owner_id = ?1",
        )?;
        let rows = stmt.query_map(params![caller.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, owner, name) = row?;
            out.push((parse_uuid("tags", &id)?, name, owner.is_none()));
        }
        Ok(out)
    }

    /// All usage records of one kind for a user (catalog ranking).
    pub fn list_usage(
        &self,
        user_id: Uuid,
        entity_kind: EntityKind,
    ) -> Result<Vec<UsageRecord>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT entity_id, awarded_first_use_bonus, score, last_used_at
             FROM usage_records WHERE user_id = ?1 AND entity_kind = ?2",
        )?;
        let rows = stmt.query_map(params![user_id.to_string(), entity_kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (entity_id, awarded, score, last_used) = row?;
            out.push(UsageRecord {
                user_id,
                entity_kind,
                entity_id: parse_uuid("usage_records", &entity_id)?,
                awarded_first_use_bonus: awarded,
                score,
                last_used_at: parse_datetime("usage_records", &last_used)?,
            });
        }
        Ok(out)
    }

    // ── Key-value store ──────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for SqliteStore {
    fn load_session(&self, id: Uuid) -> Result<Option<FocusSession>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!("{SESSION_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                session_row,
            )
            .optional()?;
        drop(conn);
        row.map(session_from_row).transpose()
    }

    fn ongoing_session(&self, user_id: Uuid) -> Result<Option<FocusSession>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!(
                    "{SESSION_SELECT} WHERE user_id = ?1 AND status IN ('working', 'break')
                     ORDER BY started_at DESC LIMIT 1"
                ),
                params![user_id.to_string()],
                session_row,
            )
            .optional()?;
        drop(conn);
        row.map(session_from_row).transpose()
    }

    fn load_user(&self, id: Uuid) -> Result<Option<UserAccount>, StorageError> {
        let row = self
            .lock()
            .query_row(
                "SELECT total_steps, stepstones, compass_active, energy_bar_active
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(total_steps, stepstones, compass, energy_bar)| UserAccount {
            id,
            total_steps,
            stepstones,
            is_compass_active: compass,
            is_energy_bar_active_for_next_session: energy_bar,
        }))
    }

    fn load_stats(&self, user_id: Uuid) -> Result<Option<UserStats>, StorageError> {
        let row = self
            .lock()
            .query_row(
                "SELECT current_streak_days, longest_streak_days, last_completion_date,
                        total_completed_sessions, total_focus_secs
                 FROM user_stats WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, u64>(3)?,
                        row.get::<_, u64>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(current, longest, last, sessions, focus)| {
            Ok(UserStats {
                user_id,
                current_streak_days: current,
                longest_streak_days: longest,
                last_session_completion_date: last
                    .map(|d| parse_date("user_stats", &d))
                    .transpose()?,
                total_completed_sessions: sessions,
                total_focus_secs: focus,
            })
        })
        .transpose()
    }

    fn load_usage(
        &self,
        user_id: Uuid,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Option<UsageRecord>, StorageError> {
        let row = self
            .lock()
            .query_row(
                "SELECT awarded_first_use_bonus, score, last_used_at
                 FROM usage_records WHERE user_id = ?1 AND entity_kind = ?2 AND entity_id = ?3",
                params![
                    user_id.to_string(),
                    entity_kind.as_str(),
                    entity_id.to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(awarded, score, last_used)| {
            Ok(UsageRecord {
                user_id,
                entity_kind,
                entity_id,
                awarded_first_use_bonus: awarded,
                score,
                last_used_at: parse_datetime("usage_records", &last_used)?,
            })
        })
        .transpose()
    }

    fn commit(&self, unit: &CommitUnit) -> Result<(), StorageError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        if let Some(session) = &unit.session {
            let config = serde_json::to_string(&session.config)
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
            let tag_ids = serde_json::to_string(&session.tag_ids)
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
            tx.execute(
                "INSERT OR REPLACE INTO sessions
                 (id, user_id, config, status, phase_started_at, phase_ends_at,
                  completed_cycles, total_work_secs, total_break_secs, started_at,
                  ended_at, todo_id, tag_ids, focus_level, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    session.id.to_string(),
                    session.user_id.to_string(),
                    config,
                    status_str(session.status),
                    session.current_phase_started_at.to_rfc3339(),
                    session.current_phase_ends_at.to_rfc3339(),
                    session.completed_cycles,
                    session.total_work_secs,
                    session.total_break_secs,
                    session.started_at.to_rfc3339(),
                    session.ended_at.map(|t| t.to_rfc3339()),
                    session.todo_id.map(|t| t.to_string()),
                    tag_ids,
                    session.focus_level,
                    session.notes,
                ],
            )?;
        }

        if let Some(user) = &unit.user {
            tx.execute(
                "INSERT OR REPLACE INTO users
                 (id, total_steps, stepstones, compass_active, energy_bar_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.total_steps,
                    user.stepstones,
                    user.is_compass_active,
                    user.is_energy_bar_active_for_next_session,
                ],
            )?;
        }

        if let Some(stats) = &unit.stats {
            tx.execute(
                "INSERT OR REPLACE INTO user_stats
                 (user_id, current_streak_days, longest_streak_days, last_completion_date,
                  total_completed_sessions, total_focus_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stats.user_id.to_string(),
                    stats.current_streak_days,
                    stats.longest_streak_days,
                    stats
                        .last_session_completion_date
                        .map(|d| d.format("%Y-%m-%d").to_string()),
                    stats.total_completed_sessions,
                    stats.total_focus_secs,
                ],
            )?;
        }

        for record in &unit.usage {
            tx.execute(
                "INSERT OR REPLACE INTO usage_records
                 (user_id, entity_kind, entity_id, awarded_first_use_bonus, score, last_used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.user_id.to_string(),
                    record.entity_kind.as_str(),
                    record.entity_id.to_string(),
                    record.awarded_first_use_bonus,
                    record.score,
                    record.last_used_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl SessionTypeCatalog for SqliteStore {
    fn resolve(&self, caller: Uuid, id: Uuid) -> EngineResult<SessionTypeSpec> {
        let row = self
            .lock()
            .query_row(
                "SELECT owner_id, work_duration_secs, break_duration_secs, number_of_cycles
                 FROM session_types WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, Option<u64>>(2)?,
                        row.get::<_, Option<u32>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(StorageError::from)?;

        let (owner, work, brk, cycles) =
            row.ok_or_else(|| EngineError::not_found("session type", id))?;
        if let Some(owner) = &owner {
            if *owner != caller.to_string() {
                return Err(EngineError::unauthorized(caller, "session type", id));
            }
        }
        Ok(SessionTypeSpec {
            work_duration_secs: work,
            break_duration_secs: brk,
            number_of_cycles: cycles,
            is_system: owner.is_none(),
        })
    }
}

impl TagCatalog for SqliteStore {
    fn resolve(&self, caller: Uuid, id: Uuid) -> EngineResult<TagSpec> {
        let row = self
            .lock()
            .query_row(
                "SELECT owner_id FROM tags WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map_err(StorageError::from)?;

        let owner = row.ok_or_else(|| EngineError::not_found("tag", id))?;
        match owner {
            Some(owner) if owner != caller.to_string() => {
                Err(EngineError::unauthorized(caller, "tag", id))
            }
            owner => Ok(TagSpec {
                is_system: owner.is_none(),
            }),
        }
    }
}

impl TodoDirectory for SqliteStore {
    fn resolve(&self, caller: Uuid, id: Uuid) -> EngineResult<()> {
        let owner = self
            .lock()
            .query_row(
                "SELECT owner_id FROM todos WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(StorageError::from)?
            .ok_or_else(|| EngineError::not_found("to-do", id))?;

        if owner != caller.to_string() {
            return Err(EngineError::unauthorized(caller, "to-do", id));
        }
        Ok(())
    }

    fn accumulate_work_duration(&self, todo_id: Uuid, user_id: Uuid, secs: u64) -> EngineResult<()> {
        let updated = self
            .lock()
            .execute(
                "UPDATE todos SET accumulated_work_secs = accumulated_work_secs + ?1
                 WHERE id = ?2 AND owner_id = ?3",
                params![secs, todo_id.to_string(), user_id.to_string()],
            )
            .map_err(StorageError::from)?;
        if updated == 0 {
            return Err(EngineError::not_found("to-do", todo_id));
        }
        Ok(())
    }
}

const SESSION_SELECT: &str = "SELECT id, user_id, config, status, phase_started_at, phase_ends_at,
        completed_cycles, total_work_secs, total_break_secs, started_at,
        ended_at, todo_id, tag_ids, focus_level, notes
 FROM sessions";

type SessionRow = (
    String,         // id
    String,         // user_id
    String,         // config json
    String,         // status
    String,         // phase_started_at
    String,         // phase_ends_at
    u32,            // completed_cycles
    u64,            // total_work_secs
    u64,            // total_break_secs
    String,         // started_at
    Option<String>, // ended_at
    Option<String>, // todo_id
    String,         // tag_ids json
    Option<u8>,     // focus_level
    Option<String>, // notes
);

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
    ))
}

fn session_from_row(row: SessionRow) -> Result<FocusSession, StorageError> {
    let (
        id,
        user_id,
        config,
        status,
        phase_started,
        phase_ends,
        completed_cycles,
        total_work_secs,
        total_break_secs,
        started_at,
        ended_at,
        todo_id,
        tag_ids,
        focus_level,
        notes,
    ) = row;

    let config: SessionConfig = serde_json::from_str(&config).map_err(|e| {
        // A session with no usable duration configuration means the row
        // was corrupted upstream, not that the caller did anything wrong.
        StorageError::Corrupt {
            table: "sessions",
            message: format!("session {id} has an undecodable config: {e}"),
        }
    })?;
    let tag_ids: Vec<Uuid> = serde_json::from_str(&tag_ids).map_err(|e| StorageError::Corrupt {
        table: "sessions",
        message: format!("session {id} has undecodable tag ids: {e}"),
    })?;

    Ok(FocusSession {
        id: parse_uuid("sessions", &id)?,
        user_id: parse_uuid("sessions", &user_id)?,
        config,
        status: status_from_str(&status)?,
        current_phase_started_at: parse_datetime("sessions", &phase_started)?,
        current_phase_ends_at: parse_datetime("sessions", &phase_ends)?,
        completed_cycles,
        total_work_secs,
        total_break_secs,
        started_at: parse_datetime("sessions", &started_at)?,
        ended_at: ended_at.map(|t| parse_datetime("sessions", &t)).transpose()?,
        todo_id: todo_id.map(|t| parse_uuid("sessions", &t)).transpose()?,
        tag_ids,
        focus_level,
        notes,
    })
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Working => "working",
        SessionStatus::Break => "break",
        SessionStatus::Completed => "completed",
        SessionStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> Result<SessionStatus, StorageError> {
    match s {
        "working" => Ok(SessionStatus::Working),
        "break" => Ok(SessionStatus::Break),
        "completed" => Ok(SessionStatus::Completed),
        "cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(StorageError::Corrupt {
            table: "sessions",
            message: format!("unknown status '{other}'"),
        }),
    }
}

fn parse_uuid(table: &'static str, s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|e| StorageError::Corrupt {
        table,
        message: format!("bad uuid '{s}': {e}"),
    })
}

fn parse_datetime(table: &'static str, s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            table,
            message: format!("bad timestamp '{s}': {e}"),
        })
}

fn parse_date(table: &'static str, s: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| StorageError::Corrupt {
        table,
        message: format!("bad date '{s}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn session_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let user_id = Uuid::new_v4();
        let mut session = FocusSession::new(
            user_id,
            SessionConfig::SessionType {
                session_type_id: Uuid::new_v4(),
                work_duration_secs: 1500,
                break_duration_secs: Some(300),
                number_of_cycles: Some(2),
            },
            Some(Uuid::new_v4()),
            vec![Uuid::new_v4(), Uuid::new_v4()],
            t0(),
        );
        session.notes = Some("deep work".into());

        store
            .commit(&CommitUnit {
                session: Some(session.clone()),
                ..Default::default()
            })
            .unwrap();

        let loaded = store.load_session(session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(store.ongoing_session(user_id).unwrap().unwrap().id, session.id);
    }

    #[test]
    fn user_stats_usage_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let mut user = UserAccount::new(Uuid::new_v4());
        user.total_steps = 120;
        user.stepstones = 12;
        user.is_compass_active = true;

        let mut stats = UserStats::new(user.id);
        stats.current_streak_days = 4;
        stats.last_session_completion_date = Some(t0().date_naive());

        let record = UsageRecord::new(user.id, EntityKind::Tag, Uuid::new_v4(), t0());

        store
            .commit(&CommitUnit {
                session: None,
                user: Some(user.clone()),
                stats: Some(stats.clone()),
                usage: vec![record.clone()],
            })
            .unwrap();

        assert_eq!(store.load_user(user.id).unwrap(), Some(user.clone()));
        assert_eq!(store.load_stats(user.id).unwrap(), Some(stats));
        assert_eq!(
            store
                .load_usage(user.id, EntityKind::Tag, record.entity_id)
                .unwrap(),
            Some(record)
        );
    }

    #[test]
    fn catalog_resolution_and_visibility() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let custom = store
            .add_session_type(Some(owner), 1500, Some(300), Some(4))
            .unwrap();
        let system_tag = store.add_tag(None, "reading").unwrap();
        let todo = store.add_todo(owner, "write report").unwrap();

        assert!(SessionTypeCatalog::resolve(&store, owner, custom).is_ok());
        assert!(matches!(
            SessionTypeCatalog::resolve(&store, stranger, custom),
            Err(EngineError::Unauthorized { .. })
        ));
        assert!(TagCatalog::resolve(&store, stranger, system_tag)
            .unwrap()
            .is_system);

        TodoDirectory::resolve(&store, owner, todo).unwrap();
        store.accumulate_work_duration(todo, owner, 900).unwrap();
        assert!(matches!(
            store.accumulate_work_duration(todo, stranger, 900),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn kv_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.kv_get("missing").unwrap(), None);
        store.kv_set("local_user_id", "abc").unwrap();
        store.kv_set("local_user_id", "def").unwrap();
        assert_eq!(store.kv_get("local_user_id").unwrap(), Some("def".into()));
    }

    #[test]
    fn corrupt_config_is_reported_not_swallowed() {
        let store = SqliteStore::open_memory().unwrap();
        let id = Uuid::new_v4();
        store
            .lock()
            .execute(
                "INSERT INTO sessions VALUES (?1, ?2, 'not json', 'working', ?3, ?3, 0, 0, 0, ?3, NULL, NULL, '[]', NULL, NULL)",
                params![id.to_string(), Uuid::new_v4().to_string(), t0().to_rfc3339()],
            )
            .unwrap();

        assert!(matches!(
            store.load_session(id),
            Err(StorageError::Corrupt { table: "sessions", .. })
        ));
    }
}
