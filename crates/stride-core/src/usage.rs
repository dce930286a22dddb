//! Usage ledger for custom catalog entities.
//!
//! One record per (user, entity) pair tracks whether the one-time
//! first-use bonus has been granted and carries a recency/frequency
//! score used to rank catalog entries for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::SessionStore;

/// Kind of user-created catalog entity a usage record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tag,
    SessionType,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::SessionType => "session_type",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::SessionType => "session type",
        }
    }
}

/// Per (user, entity) usage state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    /// Set once when the first-use bonus is granted, never unset.
    pub awarded_first_use_bonus: bool,
    /// Recency/frequency score for catalog ranking.
    pub score: f64,
    pub last_used_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(user_id: Uuid, entity_kind: EntityKind, entity_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            entity_kind,
            entity_id,
            awarded_first_use_bonus: false,
            score: 1.0,
            last_used_at: now,
        }
    }

    /// Fold one use into the ranking score.
    ///
    /// The old score decays by 10% per elapsed day, then the new use
    /// adds a full point. Frequent recent use therefore dominates
    /// one-off historical use.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let days = (now - self.last_used_at).num_days().max(0) as f64;
        self.score = self.score * 0.9f64.powf(days) + 1.0;
        self.last_used_at = now;
    }
}

/// Load the record for (user, entity), or seed a fresh one.
///
/// The fresh record is not persisted here; it travels back to the store
/// inside the commit unit of the operation that needed it.
pub fn get_or_create(
    store: &dyn SessionStore,
    user_id: Uuid,
    entity_kind: EntityKind,
    entity_id: Uuid,
    now: DateTime<Utc>,
) -> Result<UsageRecord, StorageError> {
    Ok(store
        .load_usage(user_id, entity_kind, entity_id)?
        .unwrap_or_else(|| UsageRecord::new(user_id, entity_kind, entity_id, now)))
}

/// Sort records for catalog display: highest score first, most recently
/// used breaking ties.
pub fn rank_for_display(records: &mut [UsageRecord]) {
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.last_used_at.cmp(&a.last_used_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn fresh_record_is_unawarded() {
        let rec = UsageRecord::new(Uuid::new_v4(), EntityKind::Tag, Uuid::new_v4(), at(1));
        assert!(!rec.awarded_first_use_bonus);
        assert_eq!(rec.score, 1.0);
    }

    #[test]
    fn touch_bumps_score_and_stamps_date() {
        let mut rec = UsageRecord::new(Uuid::new_v4(), EntityKind::Tag, Uuid::new_v4(), at(1));
        rec.touch(at(1));
        assert!(rec.score > 1.9, "same-day reuse should nearly double the score");

        let mut stale = UsageRecord::new(Uuid::new_v4(), EntityKind::Tag, Uuid::new_v4(), at(1));
        stale.touch(at(20));
        assert!(stale.score < rec.score, "stale record should decay before the bump");
        assert_eq!(stale.last_used_at, at(20));
    }

    #[test]
    fn ranking_prefers_score_then_recency() {
        let user = Uuid::new_v4();
        let mut hot = UsageRecord::new(user, EntityKind::Tag, Uuid::new_v4(), at(1));
        hot.touch(at(2));
        hot.touch(at(3));
        let cold = UsageRecord::new(user, EntityKind::Tag, Uuid::new_v4(), at(1));
        let mut recent = UsageRecord::new(user, EntityKind::Tag, Uuid::new_v4(), at(10));

        recent.score = cold.score; // identical score, newer use
        let mut records = vec![cold.clone(), recent.clone(), hot.clone()];
        rank_for_display(&mut records);

        assert_eq!(records[0].entity_id, hot.entity_id);
        assert_eq!(records[1].entity_id, recent.entity_id);
        assert_eq!(records[2].entity_id, cold.entity_id);
    }
}
