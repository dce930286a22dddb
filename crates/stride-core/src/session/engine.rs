//! Session engine: the single entry point for session lifecycle
//! operations.
//!
//! Each operation loads the entities it needs, computes every mutation
//! in memory (session, user currency, stats, usage records), commits
//! them to the store as one unit, and only then reports to-do time and
//! publishes events. A per-session lock map serializes writers to the
//! same session while letting unrelated sessions proceed in parallel;
//! entries are dropped once a session reaches a terminal state.
//!
//! Every operation has an `_at` variant taking an explicit `now`; the
//! plain forms use `Utc::now()`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::{SessionTypeCatalog, TagCatalog, TodoDirectory};
use crate::error::{EngineError, Result};
use crate::events::{Event, EventBus, EventSink};
use crate::scoring::{AwardResult, Consumable, ScoringEngine, UserAccount};
use crate::session::{
    Advance, FocusSession, FoldedPhase, SessionConfig, SessionStatus, MAX_PHASE_SECS,
};
use crate::storage::{CommitUnit, SessionStore};
use crate::streak::{StreakTracker, UserStats};
use crate::usage::{self, EntityKind};

pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    session_types: Arc<dyn SessionTypeCatalog>,
    tags: Arc<dyn TagCatalog>,
    todos: Arc<dyn TodoDirectory>,
    scoring: ScoringEngine,
    streaks: StreakTracker,
    bus: EventBus,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        session_types: Arc<dyn SessionTypeCatalog>,
        tags: Arc<dyn TagCatalog>,
        todos: Arc<dyn TodoDirectory>,
    ) -> Self {
        Self {
            store,
            session_types,
            tags,
            todos,
            scoring: ScoringEngine::new(),
            streaks: StreakTracker::new(),
            bus: EventBus::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringEngine) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_streaks(mut self, streaks: StreakTracker) -> Self {
        self.streaks = streaks;
        self
    }

    /// Register a post-commit event sink. Sinks fire in registration
    /// order.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.bus.subscribe(sink);
        self
    }

    /// Start a session for `owner`.
    ///
    /// Exactly one of `session_type` and `custom_duration_secs` must be
    /// given. Every referenced entity must resolve for the caller; first
    /// uses of custom (non-system) session types and tags each earn a
    /// one-time bonus, summed into the returned award.
    pub fn create_session(
        &self,
        owner: Uuid,
        session_type: Option<Uuid>,
        custom_duration_secs: Option<u64>,
        todo_id: Option<Uuid>,
        tag_ids: &[Uuid],
    ) -> Result<(FocusSession, Option<AwardResult>)> {
        self.create_session_at(owner, session_type, custom_duration_secs, todo_id, tag_ids, Utc::now())
    }

    pub fn create_session_at(
        &self,
        owner: Uuid,
        session_type: Option<Uuid>,
        custom_duration_secs: Option<u64>,
        todo_id: Option<Uuid>,
        tag_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<(FocusSession, Option<AwardResult>)> {
        // (kind, id, is_system) for every catalog entity the session uses.
        let mut entity_uses: Vec<(EntityKind, Uuid, bool)> = Vec::new();

        let config = match (session_type, custom_duration_secs) {
            (Some(id), None) => {
                let spec = self.session_types.resolve(owner, id)?;
                entity_uses.push((EntityKind::SessionType, id, spec.is_system));
                SessionConfig::SessionType {
                    session_type_id: id,
                    work_duration_secs: spec.work_duration_secs,
                    break_duration_secs: spec.break_duration_secs,
                    number_of_cycles: spec.number_of_cycles,
                }
            }
            (None, Some(duration_secs)) => SessionConfig::Custom { duration_secs },
            _ => {
                return Err(EngineError::InvalidArgument(
                    "exactly one of a session type or a custom duration must be given".into(),
                ))
            }
        };

        if config.longest_phase_secs() > MAX_PHASE_SECS {
            return Err(EngineError::InvalidArgument(format!(
                "phase duration exceeds the maximum of {MAX_PHASE_SECS} seconds"
            )));
        }

        if let Some(todo) = todo_id {
            self.todos.resolve(owner, todo)?;
        }
        for &tag in tag_ids {
            let spec = self.tags.resolve(owner, tag)?;
            entity_uses.push((EntityKind::Tag, tag, spec.is_system));
        }

        // An entity referenced twice in one request counts as one use;
        // without this the second iteration would reload the unawarded
        // stored record and grant the first-use bonus again.
        let mut seen = HashSet::new();
        entity_uses.retain(|&(kind, id, _)| seen.insert((kind, id)));

        let mut user = self.user_for(owner)?;
        let mut unit = CommitUnit::default();
        let mut awards = Vec::new();
        for (kind, id, is_system) in entity_uses {
            let mut record = usage::get_or_create(self.store.as_ref(), owner, kind, id, now)?;
            // Fresh records are already stamped `now`.
            if record.last_used_at != now {
                record.touch(now);
            }
            if !is_system {
                if let Some(award) = self.scoring.award_first_use(&mut user, &mut record, now) {
                    awards.push(award);
                }
            }
            unit.usage.push(record);
        }

        let award = AwardResult::combine(awards);
        if award.is_some() {
            unit.user = Some(user);
        }

        let session = FocusSession::new(owner, config, todo_id, tag_ids.to_vec(), now);
        unit.session = Some(session.clone());
        self.store.commit(&unit)?;

        self.bus.publish(&Event::SessionStarted {
            session_id: session.id,
            user_id: owner,
            at: now,
        });
        Ok((session, award))
    }

    /// Advance the session's state machine by one transition.
    ///
    /// Terminal sessions are a pure no-op (safe under retries): the
    /// stored session comes back unchanged with no award.
    pub fn transition_state(
        &self,
        session_id: Uuid,
        caller: Uuid,
    ) -> Result<(FocusSession, Option<AwardResult>)> {
        self.transition_state_at(session_id, caller, Utc::now())
    }

    pub fn transition_state_at(
        &self,
        session_id: Uuid,
        caller: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(FocusSession, Option<AwardResult>)> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut session = self.session_for(session_id, caller)?;
        if session.status.is_terminal() {
            self.discard_session_lock(session_id);
            return Ok((session, None));
        }

        let from = session.status;
        let advance = session.advance(now);

        let mut unit = CommitUnit::default();
        let mut award = None;
        let mut todo_work_secs = None;
        let event = match advance {
            Advance::AlreadyTerminal => return Ok((session, None)),
            Advance::WorkToBreak { work_secs } => {
                let mut stats = self.stats_for(caller)?;
                self.streaks.record_work_phase(&mut stats, work_secs, now);
                todo_work_secs = Some(work_secs);
                unit.stats = Some(stats);
                Event::PhaseAdvanced {
                    session_id,
                    user_id: caller,
                    from,
                    to: session.status,
                    at: now,
                }
            }
            Advance::BreakToWork { .. } => Event::PhaseAdvanced {
                session_id,
                user_id: caller,
                from,
                to: session.status,
                at: now,
            },
            Advance::CompletedAfterBreak { .. } => {
                // The folded phase was a break; breaks never earn streak
                // credit or to-do time.
                let mut stats = self.stats_for(caller)?;
                stats.total_completed_sessions += 1;
                let mut user = self.user_for(caller)?;
                award = self.scoring.award_session_completion(&session, &mut user, &stats);
                unit.user = Some(user);
                unit.stats = Some(stats);
                completed_event(&session, &award, now)
            }
            Advance::CompletedCustom { work_secs } => {
                let mut stats = self.stats_for(caller)?;
                self.streaks.record_work_phase(&mut stats, work_secs, now);
                stats.total_completed_sessions += 1;
                todo_work_secs = Some(work_secs);
                let mut user = self.user_for(caller)?;
                award = self.scoring.award_session_completion(&session, &mut user, &stats);
                unit.user = Some(user);
                unit.stats = Some(stats);
                completed_event(&session, &award, now)
            }
        };

        unit.session = Some(session.clone());
        self.store.commit(&unit)?;
        if session.status.is_terminal() {
            self.discard_session_lock(session_id);
        }
        // External side effects only after the state is durable; a failed
        // commit that the caller retries must not accrue the phase twice.
        if let Some(work_secs) = todo_work_secs {
            self.report_todo(&session, work_secs)?;
        }
        self.bus.publish(&event);
        Ok((session, award))
    }

    /// Manually finish a session.
    ///
    /// `target` must be `Completed` or `Cancelled`. The in-flight phase
    /// folds as elapsed wall time; a folded work phase still reports to
    /// the streak tracker and the linked to-do even on cancellation.
    /// Only completion scores; `focus_level`/`notes` apply only on
    /// completion.
    pub fn update_status(
        &self,
        session_id: Uuid,
        caller: Uuid,
        target: SessionStatus,
        focus_level: Option<u8>,
        notes: Option<String>,
    ) -> Result<(FocusSession, Option<AwardResult>)> {
        self.update_status_at(session_id, caller, target, focus_level, notes, Utc::now())
    }

    pub fn update_status_at(
        &self,
        session_id: Uuid,
        caller: Uuid,
        target: SessionStatus,
        focus_level: Option<u8>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(FocusSession, Option<AwardResult>)> {
        if !target.is_terminal() {
            return Err(EngineError::InvalidArgument(format!(
                "a session can only be manually set to Completed or Cancelled, not {target:?}"
            )));
        }

        let lock = self.session_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut session = self.session_for(session_id, caller)?;
        let folded = match session.fold_and_finalize(target, now) {
            Some(folded) => folded,
            None => {
                self.discard_session_lock(session_id);
                return Err(EngineError::InvalidOperation(format!(
                    "session {session_id} is already finished"
                )));
            }
        };

        let mut unit = CommitUnit::default();
        let mut stats = None;
        let mut todo_work_secs = None;
        if let FoldedPhase::Work { secs } = folded {
            let mut s = self.stats_for(caller)?;
            self.streaks.record_work_phase(&mut s, secs, now);
            todo_work_secs = Some(secs);
            stats = Some(s);
        }

        let mut award = None;
        let event = if target == SessionStatus::Completed {
            session.focus_level = focus_level;
            session.notes = notes;

            let mut s = match stats.take() {
                Some(s) => s,
                None => self.stats_for(caller)?,
            };
            s.total_completed_sessions += 1;
            let mut user = self.user_for(caller)?;
            award = self.scoring.award_session_completion(&session, &mut user, &s);
            unit.user = Some(user);
            stats = Some(s);
            completed_event(&session, &award, now)
        } else {
            Event::SessionCancelled {
                session_id,
                user_id: caller,
                at: now,
            }
        };

        unit.stats = stats;
        unit.session = Some(session.clone());
        self.store.commit(&unit)?;
        self.discard_session_lock(session_id);
        if let Some(work_secs) = todo_work_secs {
            self.report_todo(&session, work_secs)?;
        }
        self.bus.publish(&event);
        Ok((session, award))
    }

    /// The user's single non-terminal session, if any.
    pub fn get_ongoing_session(&self, user_id: Uuid) -> Result<Option<FocusSession>> {
        Ok(self.store.ongoing_session(user_id)?)
    }

    /// Arm a one-shot consumable flag on the user.
    pub fn arm_consumable(&self, user_id: Uuid, consumable: Consumable) -> Result<UserAccount> {
        let mut user = self.user_for(user_id)?;
        consumable.arm(&mut user);
        self.store.commit(&CommitUnit {
            user: Some(user.clone()),
            ..Default::default()
        })?;
        Ok(user)
    }

    /// Currency/consumable snapshot (a fresh account if none stored).
    pub fn account(&self, user_id: Uuid) -> Result<UserAccount> {
        self.user_for(user_id)
    }

    /// Aggregate counters (fresh zeros if none stored).
    pub fn stats(&self, user_id: Uuid) -> Result<UserStats> {
        self.stats_for(user_id)
    }

    fn session_for(&self, session_id: Uuid, caller: Uuid) -> Result<FocusSession> {
        let session = self
            .store
            .load_session(session_id)?
            .ok_or_else(|| EngineError::not_found("session", session_id))?;
        if session.user_id != caller {
            return Err(EngineError::unauthorized(caller, "session", session_id));
        }
        Ok(session)
    }

    fn user_for(&self, user_id: Uuid) -> Result<UserAccount> {
        Ok(self
            .store
            .load_user(user_id)?
            .unwrap_or_else(|| UserAccount::new(user_id)))
    }

    fn stats_for(&self, user_id: Uuid) -> Result<UserStats> {
        Ok(self
            .store
            .load_stats(user_id)?
            .unwrap_or_else(|| UserStats::new(user_id)))
    }

    fn report_todo(&self, session: &FocusSession, work_secs: u64) -> Result<()> {
        if let Some(todo_id) = session.todo_id {
            self.todos
                .accumulate_work_duration(todo_id, session.user_id, work_secs)?;
        }
        Ok(())
    }

    fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(session_id).or_default().clone()
    }

    /// Drop the lock entry once a session is terminal. Callers already
    /// holding the `Arc` are unaffected; they will observe the terminal
    /// state and no-op.
    fn discard_session_lock(&self, session_id: Uuid) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&session_id);
    }

    #[cfg(test)]
    fn session_lock_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn completed_event(
    session: &FocusSession,
    award: &Option<AwardResult>,
    now: DateTime<Utc>,
) -> Event {
    Event::SessionCompleted {
        session_id: session.id,
        user_id: session.user_id,
        total_work_secs: session.total_work_secs,
        total_break_secs: session.total_break_secs,
        completed_cycles: session.completed_cycles,
        earned_steps: award.as_ref().map_or(0, |a| a.earned_steps),
        at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap()
    }

    fn engine_with_catalog() -> (SessionEngine, Arc<MemoryCatalog>) {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let engine = SessionEngine::new(
            store,
            catalog.clone(),
            catalog.clone(),
            catalog.clone(),
        );
        (engine, catalog)
    }

    #[test]
    fn create_rejects_ambiguous_config() {
        let (engine, catalog) = engine_with_catalog();
        let user = Uuid::new_v4();
        let st = catalog.add_session_type(None, 1500, Some(300), Some(4));

        let both = engine.create_session_at(user, Some(st), Some(600), None, &[], t0());
        assert!(matches!(both, Err(EngineError::InvalidArgument(_))));

        let neither = engine.create_session_at(user, None, None, None, &[], t0());
        assert!(matches!(neither, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn create_sums_independent_first_use_bonuses() {
        let (engine, catalog) = engine_with_catalog();
        let user = Uuid::new_v4();
        let st = catalog.add_session_type(Some(user), 1500, Some(300), None);
        let tag_a = catalog.add_tag(Some(user));
        let tag_b = catalog.add_tag(Some(user));

        let (_, award) = engine
            .create_session_at(user, Some(st), None, None, &[tag_a, tag_b], t0())
            .unwrap();
        let award = award.unwrap();
        assert_eq!(award.earned_steps, 150);
        assert_eq!(award.earned_stepstones, 15);

        // Same entities again: no further bonus.
        let (_, again) = engine
            .create_session_at(user, Some(st), None, None, &[tag_a, tag_b], t0())
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn duplicate_entity_in_one_request_awards_first_use_once() {
        let (engine, catalog) = engine_with_catalog();
        let user = Uuid::new_v4();
        let tag = catalog.add_tag(Some(user));

        let (_, award) = engine
            .create_session_at(user, None, Some(600), None, &[tag, tag], t0())
            .unwrap();
        assert_eq!(award.unwrap().earned_steps, 50);
        assert_eq!(engine.account(user).unwrap().total_steps, 50);
    }

    #[test]
    fn oversized_durations_are_rejected_up_front() {
        let (engine, catalog) = engine_with_catalog();
        let user = Uuid::new_v4();

        for secs in [MAX_PHASE_SECS + 1, 10_000_000_000_000_000, u64::MAX] {
            assert!(matches!(
                engine.create_session_at(user, None, Some(secs), None, &[], t0()),
                Err(EngineError::InvalidArgument(_))
            ));
        }

        // Oversized catalog entries are caught too, break phase included.
        let huge = catalog.add_session_type(None, 1500, Some(u64::MAX), None);
        assert!(matches!(
            engine.create_session_at(user, Some(huge), None, None, &[], t0()),
            Err(EngineError::InvalidArgument(_))
        ));

        // The bound itself is usable and keeps phase ends ordered.
        let (session, _) = engine
            .create_session_at(user, None, Some(MAX_PHASE_SECS), None, &[], t0())
            .unwrap();
        assert!(session.current_phase_ends_at >= session.current_phase_started_at);
    }

    #[test]
    fn system_entities_never_earn_first_use() {
        let (engine, catalog) = engine_with_catalog();
        let user = Uuid::new_v4();
        let st = catalog.add_session_type(None, 1500, Some(300), None);
        let tag = catalog.add_tag(None);

        let (_, award) = engine
            .create_session_at(user, Some(st), None, None, &[tag], t0())
            .unwrap();
        assert!(award.is_none());
        assert_eq!(engine.account(user).unwrap().total_steps, 0);
    }

    #[test]
    fn unresolvable_references_abort_creation() {
        let (engine, catalog) = engine_with_catalog();
        let user = Uuid::new_v4();

        assert!(matches!(
            engine.create_session_at(user, Some(Uuid::new_v4()), None, None, &[], t0()),
            Err(EngineError::NotFound { .. })
        ));

        let other = Uuid::new_v4();
        let foreign_tag = catalog.add_tag(Some(other));
        assert!(matches!(
            engine.create_session_at(user, None, Some(600), None, &[foreign_tag], t0()),
            Err(EngineError::Unauthorized { .. })
        ));
    }

    #[test]
    fn transition_on_terminal_session_is_a_noop() {
        let (engine, _) = engine_with_catalog();
        let user = Uuid::new_v4();
        let (session, _) = engine
            .create_session_at(user, None, Some(600), None, &[], t0())
            .unwrap();

        let (done, award) = engine
            .transition_state_at(session.id, user, t0() + Duration::seconds(600))
            .unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert!(award.is_some());

        let (same, none) = engine
            .transition_state_at(session.id, user, t0() + Duration::seconds(1200))
            .unwrap();
        assert_eq!(same, done);
        assert!(none.is_none());
    }

    #[test]
    fn update_status_rejects_non_terminal_target() {
        let (engine, _) = engine_with_catalog();
        let user = Uuid::new_v4();
        let (session, _) = engine
            .create_session_at(user, None, Some(600), None, &[], t0())
            .unwrap();

        for target in [SessionStatus::Working, SessionStatus::Break] {
            assert!(matches!(
                engine.update_status_at(session.id, user, target, None, None, t0()),
                Err(EngineError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn session_locks_are_released_once_terminal() {
        let (engine, _) = engine_with_catalog();
        let user = Uuid::new_v4();

        let (first, _) = engine
            .create_session_at(user, None, Some(600), None, &[], t0())
            .unwrap();
        engine
            .transition_state_at(first.id, user, t0() + Duration::seconds(600))
            .unwrap();
        assert_eq!(engine.session_lock_count(), 0);

        // Retries on the finished session leave nothing behind either.
        engine
            .transition_state_at(first.id, user, t0() + Duration::seconds(700))
            .unwrap();
        assert_eq!(engine.session_lock_count(), 0);

        let (second, _) = engine
            .create_session_at(user, None, Some(600), None, &[], t0())
            .unwrap();
        engine
            .update_status_at(second.id, user, SessionStatus::Cancelled, None, None, t0())
            .unwrap();
        assert_eq!(engine.session_lock_count(), 0);
    }

    #[test]
    fn arm_consumable_round_trip() {
        let (engine, _) = engine_with_catalog();
        let user = Uuid::new_v4();

        let account = engine.arm_consumable(user, Consumable::EnergyBar).unwrap();
        assert!(account.is_energy_bar_active_for_next_session);
        assert!(!account.is_compass_active);
        assert!(engine.account(user).unwrap().is_energy_bar_active_for_next_session);
    }
}
