//! TOML-based configuration.
//!
//! Covers the tunable schedule knobs: the scoring tables and the streak
//! qualifying threshold. Every field carries a serde default, so a
//! config file only needs to name the values it overrides.
//!
//! Stored at `~/.config/stride/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::StorageError;
use crate::scoring::ScoreTable;
use crate::streak::QUALIFYING_PHASE_SECS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoreTable,
    /// Minimum work-phase length (seconds) that counts toward the streak.
    #[serde(default = "default_streak_qualifying_secs")]
    pub streak_qualifying_secs: u64,
}

fn default_streak_qualifying_secs() -> u64 {
    QUALIFYING_PHASE_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scoring: ScoreTable::default(),
            streak_qualifying_secs: default_streak_qualifying_secs(),
        }
    }
}

impl Config {
    pub fn path() -> Result<PathBuf, StorageError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load the config, writing the defaults to disk on first run.
    pub fn load() -> Result<Self, StorageError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| StorageError::Config(e.to_string()))
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save(&self) -> Result<(), StorageError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StorageError::Config(e.to_string()))?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.streak_qualifying_secs, 1500);
        assert_eq!(cfg.scoring.first_use_steps, 50);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg: Config = toml::from_str(
            "streak_qualifying_secs = 900\n\n[scoring]\nfirst_use_steps = 10\n",
        )
        .unwrap();
        assert_eq!(cfg.streak_qualifying_secs, 900);
        assert_eq!(cfg.scoring.first_use_steps, 10);
        assert_eq!(cfg.scoring.todo_completion_steps, 20);
        assert_eq!(cfg.scoring.minute_tiers, vec![(5, 5), (15, 10), (30, 20), (45, 30), (60, 40)]);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.scoring.energy_bar_bonus_pct = 25;
        cfg.streak_qualifying_secs = 600;

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
