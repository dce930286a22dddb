//! Consecutive-day streak tracking.
//!
//! A user's streak counts calendar days (UTC) with at least one
//! qualifying work phase. Sub-threshold phases still feed the cumulative
//! focus-duration counter but never touch the streak.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum work-phase length that counts toward the streak (25 minutes).
pub const QUALIFYING_PHASE_SECS: u64 = 1500;

/// Per-user aggregate counters. Lazily created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: Uuid,
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    /// Last UTC calendar date on which a qualifying work phase was recorded.
    pub last_session_completion_date: Option<NaiveDate>,
    pub total_completed_sessions: u64,
    pub total_focus_secs: u64,
}

impl UserStats {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak_days: 0,
            longest_streak_days: 0,
            last_session_completion_date: None,
            total_completed_sessions: 0,
            total_focus_secs: 0,
        }
    }
}

/// Streak tracker.
///
/// Stateless apart from its qualifying threshold; the mutable state
/// lives in [`UserStats`] so it can travel through the same commit unit
/// as the session that produced the work phase.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    qualifying_phase_secs: u64,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self {
            qualifying_phase_secs: QUALIFYING_PHASE_SECS,
        }
    }

    pub fn with_threshold(qualifying_phase_secs: u64) -> Self {
        Self {
            qualifying_phase_secs,
        }
    }

    /// Fold one completed work phase into the user's stats.
    ///
    /// The cumulative focus counter always increases. The streak is only
    /// evaluated for phases at or above the qualifying threshold:
    /// same-day phases are ignored (guards double-counting), a phase on
    /// the day after the last credited one extends the streak, anything
    /// else resets it to 1.
    ///
    /// Returns `true` when a new streak day was credited.
    pub fn record_work_phase(
        &self,
        stats: &mut UserStats,
        phase_secs: u64,
        phase_end: DateTime<Utc>,
    ) -> bool {
        stats.total_focus_secs += phase_secs;

        if phase_secs < self.qualifying_phase_secs {
            return false;
        }

        let today = phase_end.date_naive();
        match stats.last_session_completion_date {
            Some(last) if last == today => return false,
            Some(last) if last.succ_opt() == Some(today) => {
                stats.current_streak_days += 1;
            }
            _ => stats.current_streak_days = 1,
        }
        stats.longest_streak_days = stats.longest_streak_days.max(stats.current_streak_days);
        stats.last_session_completion_date = Some(today);
        true
    }
}

impl Default for StreakTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let tracker = StreakTracker::new();
        let mut stats = UserStats::new(Uuid::new_v4());

        assert!(tracker.record_work_phase(&mut stats, 1800, day(1)));
        assert_eq!(stats.current_streak_days, 1);

        assert!(tracker.record_work_phase(&mut stats, 1800, day(2)));
        assert_eq!(stats.current_streak_days, 2);
        assert_eq!(stats.longest_streak_days, 2);
    }

    #[test]
    fn gap_resets_streak() {
        let tracker = StreakTracker::new();
        let mut stats = UserStats::new(Uuid::new_v4());

        tracker.record_work_phase(&mut stats, 1800, day(1));
        tracker.record_work_phase(&mut stats, 1800, day(2));
        tracker.record_work_phase(&mut stats, 1800, day(4));

        assert_eq!(stats.current_streak_days, 1);
        assert_eq!(stats.longest_streak_days, 2);
    }

    #[test]
    fn same_day_counts_once() {
        let tracker = StreakTracker::new();
        let mut stats = UserStats::new(Uuid::new_v4());

        assert!(tracker.record_work_phase(&mut stats, 1800, day(1)));
        assert!(!tracker.record_work_phase(&mut stats, 1800, day(1)));
        assert_eq!(stats.current_streak_days, 1);
    }

    #[test]
    fn sub_threshold_phase_feeds_total_but_not_streak() {
        let tracker = StreakTracker::new();
        let mut stats = UserStats::new(Uuid::new_v4());

        assert!(!tracker.record_work_phase(&mut stats, 1499, day(1)));
        assert_eq!(stats.current_streak_days, 0);
        assert_eq!(stats.total_focus_secs, 1499);
        assert_eq!(stats.last_session_completion_date, None);
    }

    #[test]
    fn threshold_boundary_qualifies() {
        let tracker = StreakTracker::new();
        let mut stats = UserStats::new(Uuid::new_v4());

        assert!(tracker.record_work_phase(&mut stats, 1500, day(1)));
        assert_eq!(stats.current_streak_days, 1);
    }

    #[test]
    fn longest_streak_survives_reset() {
        let tracker = StreakTracker::new();
        let mut stats = UserStats::new(Uuid::new_v4());

        for d in 1..=5 {
            tracker.record_work_phase(&mut stats, 1800, day(d));
        }
        assert_eq!(stats.longest_streak_days, 5);

        tracker.record_work_phase(&mut stats, 1800, day(10));
        assert_eq!(stats.current_streak_days, 1);
        assert_eq!(stats.longest_streak_days, 5);
    }
}
