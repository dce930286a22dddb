//! Gamification scoring engine.
//!
//! Converts completed sessions, completed to-dos, and first uses of
//! custom catalog entities into Steps and Stepstones (1 Stepstone per
//! 10 Steps, integer division, evaluated per award event).
//!
//! All three award paths share one shape: a base amount, an optional
//! one-shot consumable bonus, and an optional streak multiplier. The
//! shape is expressed once in [`ScoringEngine::apply_award`] so the
//! consumable-consumption pattern exists in exactly one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::FocusSession;
use crate::streak::UserStats;
use crate::usage::UsageRecord;

/// Steps per Stepstone. Fractional Steps are never converted.
pub const STEPS_PER_STEPSTONE: u64 = 10;

/// Currency and consumable state carried on the user entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub total_steps: u64,
    pub stepstones: u64,
    pub is_compass_active: bool,
    pub is_energy_bar_active_for_next_session: bool,
}

impl UserAccount {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            total_steps: 0,
            stepstones: 0,
            is_compass_active: false,
            is_energy_bar_active_for_next_session: false,
        }
    }
}

/// Single-use purchased effects, represented as boolean flags on the
/// user and cleared by the award that consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumable {
    EnergyBar,
    Compass,
}

impl Consumable {
    pub fn label(&self) -> &'static str {
        match self {
            Consumable::EnergyBar => "Energy Bar",
            Consumable::Compass => "Compass",
        }
    }

    /// Arm the flag; the next award that can use it will consume it.
    pub fn arm(&self, user: &mut UserAccount) {
        *self.flag(user) = true;
    }

    fn flag<'a>(&self, user: &'a mut UserAccount) -> &'a mut bool {
        match self {
            Consumable::EnergyBar => &mut user.is_energy_bar_active_for_next_session,
            Consumable::Compass => &mut user.is_compass_active,
        }
    }
}

/// Clear the consumable's flag and report whether it was armed.
/// One-shot by construction: a second call always returns false.
fn consume_if_active(user: &mut UserAccount, consumable: Consumable) -> bool {
    let flag = consumable.flag(user);
    std::mem::take(flag)
}

/// Bonus granted when a consumable flag turns out to be armed.
#[derive(Debug, Clone, Copy)]
enum ConsumableBonus {
    Flat(u64),
    /// Percentage of the base, floored.
    Percent(u64),
}

/// Award tables. Serde defaults match the production tiers so a config
/// file only needs to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    /// (minute threshold, bonus steps), ascending. The highest threshold
    /// at or below the session's work minutes applies.
    #[serde(default = "default_minute_tiers")]
    pub minute_tiers: Vec<(u64, u64)>,
    /// (streak-day threshold, multiplier), ascending.
    #[serde(default = "default_streak_tiers")]
    pub streak_tiers: Vec<(u32, f64)>,
    /// Energy Bar bonus as a percentage of the session base.
    #[serde(default = "default_energy_bar_bonus_pct")]
    pub energy_bar_bonus_pct: u64,
    #[serde(default = "default_first_use_steps")]
    pub first_use_steps: u64,
    #[serde(default = "default_todo_completion_steps")]
    pub todo_completion_steps: u64,
    #[serde(default = "default_compass_bonus_steps")]
    pub compass_bonus_steps: u64,
}

fn default_minute_tiers() -> Vec<(u64, u64)> {
    vec![(5, 5), (15, 10), (30, 20), (45, 30), (60, 40)]
}

fn default_streak_tiers() -> Vec<(u32, f64)> {
    vec![(3, 1.2), (7, 1.5), (14, 1.8), (30, 2.0)]
}

fn default_energy_bar_bonus_pct() -> u64 {
    15
}

fn default_first_use_steps() -> u64 {
    50
}

fn default_todo_completion_steps() -> u64 {
    20
}

fn default_compass_bonus_steps() -> u64 {
    25
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            minute_tiers: default_minute_tiers(),
            streak_tiers: default_streak_tiers(),
            energy_bar_bonus_pct: default_energy_bar_bonus_pct(),
            first_use_steps: default_first_use_steps(),
            todo_completion_steps: default_todo_completion_steps(),
            compass_bonus_steps: default_compass_bonus_steps(),
        }
    }
}

/// Outcome of one award event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardResult {
    pub earned_steps: u64,
    pub earned_stepstones: u64,
    /// Human-readable notification line.
    pub message: String,
}

impl AwardResult {
    /// Sum several independent awards into one (e.g. the first-use
    /// bonuses triggered by one creation request). Stepstones are summed
    /// per event, matching how each award applied them.
    pub fn combine<I: IntoIterator<Item = AwardResult>>(results: I) -> Option<AwardResult> {
        let mut iter = results.into_iter();
        let mut acc = iter.next()?;
        for r in iter {
            acc.earned_steps += r.earned_steps;
            acc.earned_stepstones += r.earned_stepstones;
            acc.message.push_str("; ");
            acc.message.push_str(&r.message);
        }
        Some(acc)
    }
}

/// Scoring engine.
///
/// Pure calculation plus in-place mutation of the user's currency
/// fields; persistence of the mutated user belongs to the commit unit
/// of the triggering operation.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    table: ScoreTable,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self {
            table: ScoreTable::default(),
        }
    }

    pub fn with_table(table: ScoreTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ScoreTable {
        &self.table
    }

    /// Award for a completed session.
    ///
    /// Returns `None` for zero-minute sessions; in that case no flag is
    /// consumed and no currency moves.
    pub fn award_session_completion(
        &self,
        session: &FocusSession,
        user: &mut UserAccount,
        stats: &UserStats,
    ) -> Option<AwardResult> {
        let minutes = session.total_work_secs / 60;
        if minutes == 0 {
            return None;
        }

        let base = minutes + self.minute_tier_bonus(minutes);
        let multiplier = self.streak_multiplier(stats.current_streak_days);
        Some(self.apply_award(
            user,
            base,
            Some((
                Consumable::EnergyBar,
                ConsumableBonus::Percent(self.table.energy_bar_bonus_pct),
            )),
            multiplier,
            "Focus session complete",
        ))
    }

    /// One-time bonus for the first use of a custom entity.
    ///
    /// No-op when the record was already awarded; the flag is set and
    /// the record stamped in the same call that grants the steps.
    pub fn award_first_use(
        &self,
        user: &mut UserAccount,
        record: &mut UsageRecord,
        now: DateTime<Utc>,
    ) -> Option<AwardResult> {
        if record.awarded_first_use_bonus {
            return None;
        }
        record.awarded_first_use_bonus = true;
        record.last_used_at = now;

        let what = format!("First use of a custom {}", record.entity_kind.label());
        Some(self.apply_award(user, self.table.first_use_steps, None, 1.0, &what))
    }

    /// Award for completing a to-do that had focus time logged on it.
    pub fn award_todo_completion_with_focus(
        &self,
        user: &mut UserAccount,
        _todo_id: Uuid,
    ) -> AwardResult {
        self.apply_award(
            user,
            self.table.todo_completion_steps,
            Some((
                Consumable::Compass,
                ConsumableBonus::Flat(self.table.compass_bonus_steps),
            )),
            1.0,
            "To-do completed with focus",
        )
    }

    /// The single award routine all three paths flow through.
    fn apply_award(
        &self,
        user: &mut UserAccount,
        mut base: u64,
        consumable: Option<(Consumable, ConsumableBonus)>,
        multiplier: f64,
        what: &str,
    ) -> AwardResult {
        let mut used = None;
        if let Some((item, bonus)) = consumable {
            if consume_if_active(user, item) {
                base += match bonus {
                    ConsumableBonus::Flat(steps) => steps,
                    ConsumableBonus::Percent(pct) => base * pct / 100,
                };
                used = Some(item);
            }
        }

        let earned_steps = (base as f64 * multiplier).floor() as u64;
        let earned_stepstones = earned_steps / STEPS_PER_STEPSTONE;
        user.total_steps += earned_steps;
        user.stepstones += earned_stepstones;

        let mut details = Vec::new();
        if let Some(item) = used {
            details.push(format!("{} bonus applied", item.label()));
        }
        if multiplier > 1.0 {
            details.push(format!("streak multiplier x{multiplier}"));
        }
        let message = if details.is_empty() {
            format!("{what}: earned {earned_steps} Steps")
        } else {
            format!("{what}: earned {earned_steps} Steps ({})", details.join(", "))
        };

        AwardResult {
            earned_steps,
            earned_stepstones,
            message,
        }
    }

    fn minute_tier_bonus(&self, minutes: u64) -> u64 {
        self.table
            .minute_tiers
            .iter()
            .filter(|(threshold, _)| *threshold <= minutes)
            .map(|(_, bonus)| *bonus)
            .last()
            .unwrap_or(0)
    }

    fn streak_multiplier(&self, streak_days: u32) -> f64 {
        self.table
            .streak_tiers
            .iter()
            .filter(|(threshold, _)| *threshold <= streak_days)
            .map(|(_, multiplier)| *multiplier)
            .last()
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FocusSession, SessionConfig};
    use chrono::Utc;
    use proptest::prelude::*;

    fn session_with_work_secs(user_id: Uuid, secs: u64) -> FocusSession {
        let mut session = FocusSession::new(
            user_id,
            SessionConfig::Custom { duration_secs: secs },
            None,
            Vec::new(),
            Utc::now(),
        );
        session.total_work_secs = secs;
        session
    }

    fn complete(
        engine: &ScoringEngine,
        user: &mut UserAccount,
        stats: &UserStats,
        work_secs: u64,
    ) -> Option<AwardResult> {
        let session = session_with_work_secs(user.id, work_secs);
        engine.award_session_completion(&session, user, stats)
    }

    #[test]
    fn zero_duration_session_earns_nothing() {
        let engine = ScoringEngine::new();
        let mut user = UserAccount::new(Uuid::new_v4());
        user.is_energy_bar_active_for_next_session = true;
        let stats = UserStats::new(user.id);

        assert!(complete(&engine, &mut user, &stats, 59).is_none());
        assert_eq!(user.total_steps, 0);
        assert!(
            user.is_energy_bar_active_for_next_session,
            "flag must survive a no-award completion"
        );
    }

    #[test]
    fn minute_tier_bonuses() {
        let engine = ScoringEngine::new();
        assert_eq!(engine.minute_tier_bonus(4), 0);
        assert_eq!(engine.minute_tier_bonus(5), 5);
        assert_eq!(engine.minute_tier_bonus(14), 5);
        assert_eq!(engine.minute_tier_bonus(15), 10);
        assert_eq!(engine.minute_tier_bonus(30), 20);
        assert_eq!(engine.minute_tier_bonus(45), 30);
        assert_eq!(engine.minute_tier_bonus(60), 40);
        assert_eq!(engine.minute_tier_bonus(600), 40);
    }

    #[test]
    fn streak_multiplier_boundaries() {
        let engine = ScoringEngine::new();
        assert_eq!(engine.streak_multiplier(0), 1.0);
        assert_eq!(engine.streak_multiplier(2), 1.0);
        assert_eq!(engine.streak_multiplier(3), 1.2);
        assert_eq!(engine.streak_multiplier(6), 1.2);
        assert_eq!(engine.streak_multiplier(7), 1.5);
        assert_eq!(engine.streak_multiplier(13), 1.5);
        assert_eq!(engine.streak_multiplier(14), 1.8);
        assert_eq!(engine.streak_multiplier(29), 1.8);
        assert_eq!(engine.streak_multiplier(30), 2.0);
        assert_eq!(engine.streak_multiplier(365), 2.0);
    }

    #[test]
    fn thirty_minute_session_no_modifiers() {
        let engine = ScoringEngine::new();
        let mut user = UserAccount::new(Uuid::new_v4());
        let stats = UserStats::new(user.id);

        let award = complete(&engine, &mut user, &stats, 30 * 60).unwrap();
        // 30 minute-steps + 20 tier bonus
        assert_eq!(award.earned_steps, 50);
        assert_eq!(award.earned_stepstones, 5);
        assert_eq!(user.total_steps, 50);
        assert_eq!(user.stepstones, 5);
    }

    #[test]
    fn energy_bar_is_consumed_once() {
        let engine = ScoringEngine::new();
        let mut user = UserAccount::new(Uuid::new_v4());
        user.is_energy_bar_active_for_next_session = true;
        let stats = UserStats::new(user.id);

        // base 50, +15% = 57
        let award = complete(&engine, &mut user, &stats, 30 * 60).unwrap();
        assert_eq!(award.earned_steps, 57);
        assert!(!user.is_energy_bar_active_for_next_session);
        assert!(award.message.contains("Energy Bar"));

        // second session gets no bonus
        let again = complete(&engine, &mut user, &stats, 30 * 60).unwrap();
        assert_eq!(again.earned_steps, 50);
    }

    #[test]
    fn streak_multiplier_floors() {
        let engine = ScoringEngine::new();
        let mut user = UserAccount::new(Uuid::new_v4());
        let mut stats = UserStats::new(user.id);
        stats.current_streak_days = 7;

        // base 50 * 1.5 = 75
        let award = complete(&engine, &mut user, &stats, 30 * 60).unwrap();
        assert_eq!(award.earned_steps, 75);

        stats.current_streak_days = 3;
        // 25 minute-steps + 10 tier = 35, * 1.2 = 42.0 -> 42
        let award = complete(&engine, &mut user, &stats, 25 * 60).unwrap();
        assert_eq!(award.earned_steps, 42);
    }

    #[test]
    fn todo_completion_with_compass() {
        let engine = ScoringEngine::new();
        let mut user = UserAccount::new(Uuid::new_v4());
        user.is_compass_active = true;

        let award = engine.award_todo_completion_with_focus(&mut user, Uuid::new_v4());
        assert_eq!(award.earned_steps, 45);
        assert_eq!(award.earned_stepstones, 4);
        assert!(!user.is_compass_active);

        let plain = engine.award_todo_completion_with_focus(&mut user, Uuid::new_v4());
        assert_eq!(plain.earned_steps, 20);
    }

    #[test]
    fn first_use_awarded_at_most_once() {
        let engine = ScoringEngine::new();
        let mut user = UserAccount::new(Uuid::new_v4());
        let now = Utc::now();
        let mut record =
            UsageRecord::new(user.id, crate::usage::EntityKind::Tag, Uuid::new_v4(), now);

        let award = engine.award_first_use(&mut user, &mut record, now).unwrap();
        assert_eq!(award.earned_steps, 50);
        assert!(record.awarded_first_use_bonus);

        assert!(engine.award_first_use(&mut user, &mut record, now).is_none());
        assert_eq!(user.total_steps, 50);
    }

    #[test]
    fn combine_sums_awards() {
        let a = AwardResult {
            earned_steps: 50,
            earned_stepstones: 5,
            message: "a".into(),
        };
        let b = AwardResult {
            earned_steps: 50,
            earned_stepstones: 5,
            message: "b".into(),
        };
        let combined = AwardResult::combine([a, b]).unwrap();
        assert_eq!(combined.earned_steps, 100);
        assert_eq!(combined.earned_stepstones, 10);
        assert_eq!(combined.message, "a; b");

        assert!(AwardResult::combine(Vec::new()).is_none());
    }

    proptest! {
        #[test]
        fn earned_steps_monotone_in_minutes(minutes in 0u64..600, streak in 0u32..40) {
            let engine = ScoringEngine::new();
            let mut stats = UserStats::new(Uuid::new_v4());
            stats.current_streak_days = streak;

            let mut user_a = UserAccount::new(Uuid::new_v4());
            let mut user_b = UserAccount::new(Uuid::new_v4());
            let shorter = complete(&engine, &mut user_a, &stats, minutes * 60)
                .map(|a| a.earned_steps)
                .unwrap_or(0);
            let longer = complete(&engine, &mut user_b, &stats, (minutes + 1) * 60)
                .map(|a| a.earned_steps)
                .unwrap_or(0);

            prop_assert!(longer >= shorter);
        }
    }
}
