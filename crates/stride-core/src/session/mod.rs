//! Focus session model.
//!
//! A session is a wall-clock-driven state machine:
//!
//! ```text
//! Working <-> Break -> Completed
//!    |          |
//!    +----------+----> Cancelled (manual)
//! ```
//!
//! Custom-duration sessions have a single Working phase and complete on
//! their first transition. All elapsed-time folding happens inside
//! [`FocusSession::advance`] and [`FocusSession::fold_and_finalize`];
//! no other code computes `now - phase_start`, so a phase can never be
//! double-counted or skipped across the call sites that finalize
//! sessions.

pub mod engine;

pub use engine::SessionEngine;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Working,
    Break,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Terminal states never mutate again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

/// Upper bound on any configured phase length (about ten years).
///
/// Phase-end timestamps are computed as `now + duration`; durations at
/// or below this bound stay well inside chrono's representable range,
/// so `current_phase_ends_at >= current_phase_started_at` always holds
/// for non-terminal sessions.
pub const MAX_PHASE_SECS: u64 = 315_360_000;

/// Duration configuration, fixed at creation.
///
/// Exactly one shape exists per session: a catalog session type with a
/// work/break cycle, or a single uninterrupted custom work phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionConfig {
    SessionType {
        session_type_id: Uuid,
        work_duration_secs: u64,
        break_duration_secs: Option<u64>,
        number_of_cycles: Option<u32>,
    },
    Custom {
        duration_secs: u64,
    },
}

impl SessionConfig {
    /// Length of the first Working phase.
    pub fn initial_phase_secs(&self) -> u64 {
        match self {
            SessionConfig::SessionType {
                work_duration_secs, ..
            } => *work_duration_secs,
            SessionConfig::Custom { duration_secs } => *duration_secs,
        }
    }

    /// The longest phase this configuration can ever schedule.
    pub fn longest_phase_secs(&self) -> u64 {
        match self {
            SessionConfig::SessionType {
                work_duration_secs,
                break_duration_secs,
                ..
            } => (*work_duration_secs).max(break_duration_secs.unwrap_or(0)),
            SessionConfig::Custom { duration_secs } => *duration_secs,
        }
    }
}

/// What a call to [`FocusSession::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Session already terminal; nothing changed.
    AlreadyTerminal,
    /// Work phase folded, break scheduled.
    WorkToBreak { work_secs: u64 },
    /// Break folded, next work phase scheduled.
    BreakToWork { break_secs: u64 },
    /// Break folded and the cycle target reached; session completed.
    CompletedAfterBreak { break_secs: u64 },
    /// Custom session completed in its single transition.
    CompletedCustom { work_secs: u64 },
}

/// The phase that was in flight when a session was manually finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldedPhase {
    Work { secs: u64 },
    Break { secs: u64 },
}

/// One user's timed focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub config: SessionConfig,
    pub status: SessionStatus,
    /// Wall-clock start of the current phase.
    pub current_phase_started_at: DateTime<Utc>,
    /// When the current phase is scheduled to end.
    pub current_phase_ends_at: DateTime<Utc>,
    /// Work+break pairs finished.
    pub completed_cycles: u32,
    /// Cumulative seconds actually elapsed working. Only increases.
    pub total_work_secs: u64,
    /// Cumulative seconds actually elapsed on break. Only increases.
    pub total_break_secs: u64,
    pub started_at: DateTime<Utc>,
    /// Set only when the session reaches a terminal status.
    pub ended_at: Option<DateTime<Utc>>,
    /// Linked to-do item; completed work phases accrue to it.
    pub todo_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
    /// Caller-supplied on manual completion.
    pub focus_level: Option<u8>,
    pub notes: Option<String>,
}

impl FocusSession {
    pub fn new(
        user_id: Uuid,
        config: SessionConfig,
        todo_id: Option<Uuid>,
        tag_ids: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let initial_secs = config.initial_phase_secs();
        Self {
            id: Uuid::new_v4(),
            user_id,
            config,
            status: SessionStatus::Working,
            current_phase_started_at: now,
            current_phase_ends_at: now + Duration::seconds(initial_secs as i64),
            completed_cycles: 0,
            total_work_secs: 0,
            total_break_secs: 0,
            started_at: now,
            ended_at: None,
            todo_id,
            tag_ids,
            focus_level: None,
            notes: None,
        }
    }

    /// Seconds actually elapsed in the current phase.
    fn phase_elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.current_phase_started_at).num_seconds().max(0) as u64
    }

    /// Advance the state machine by one transition.
    ///
    /// Terminal sessions are untouched (idempotent under retries).
    /// Custom sessions fold their full configured duration and complete
    /// immediately; type-based sessions alternate Working/Break and
    /// complete once the cycle target is reached on a break fold.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Advance {
        if self.status.is_terminal() {
            return Advance::AlreadyTerminal;
        }

        match self.config {
            SessionConfig::Custom { duration_secs } => {
                self.total_work_secs += duration_secs;
                self.finalize(SessionStatus::Completed, now);
                Advance::CompletedCustom {
                    work_secs: duration_secs,
                }
            }
            SessionConfig::SessionType {
                work_duration_secs,
                break_duration_secs,
                number_of_cycles,
                ..
            } => match self.status {
                SessionStatus::Working => {
                    let elapsed = self.phase_elapsed_secs(now);
                    self.total_work_secs += elapsed;
                    self.begin_phase(
                        SessionStatus::Break,
                        break_duration_secs.unwrap_or(0),
                        now,
                    );
                    Advance::WorkToBreak { work_secs: elapsed }
                }
                SessionStatus::Break => {
                    let elapsed = self.phase_elapsed_secs(now);
                    self.total_break_secs += elapsed;
                    self.completed_cycles += 1;
                    match number_of_cycles {
                        Some(target) if self.completed_cycles >= target => {
                            self.finalize(SessionStatus::Completed, now);
                            Advance::CompletedAfterBreak {
                                break_secs: elapsed,
                            }
                        }
                        _ => {
                            self.begin_phase(SessionStatus::Working, work_duration_secs, now);
                            Advance::BreakToWork {
                                break_secs: elapsed,
                            }
                        }
                    }
                }
                // Guarded by is_terminal above.
                SessionStatus::Completed | SessionStatus::Cancelled => Advance::AlreadyTerminal,
            },
        }
    }

    /// Fold the in-flight phase and finalize to `target`.
    ///
    /// Used by manual completion/cancellation: the phase folds as
    /// elapsed wall time regardless of configuration. Returns `None`
    /// when the session was already terminal (nothing mutated).
    pub fn fold_and_finalize(
        &mut self,
        target: SessionStatus,
        now: DateTime<Utc>,
    ) -> Option<FoldedPhase> {
        let folded = match self.status {
            SessionStatus::Working => {
                let secs = self.phase_elapsed_secs(now);
                self.total_work_secs += secs;
                FoldedPhase::Work { secs }
            }
            SessionStatus::Break => {
                let secs = self.phase_elapsed_secs(now);
                self.total_break_secs += secs;
                FoldedPhase::Break { secs }
            }
            SessionStatus::Completed | SessionStatus::Cancelled => return None,
        };
        self.finalize(target, now);
        Some(folded)
    }

    fn begin_phase(&mut self, status: SessionStatus, duration_secs: u64, now: DateTime<Utc>) {
        self.status = status;
        self.current_phase_started_at = now;
        self.current_phase_ends_at = now + Duration::seconds(duration_secs as i64);
    }

    fn finalize(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.ended_at = Some(now);
        self.current_phase_ends_at = now;
    }
}
