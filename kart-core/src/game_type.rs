use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{RaceError, Result};
use crate::player::lap_info::LapNumber;

// The rules a match runs under. Practice (no laps) and score collection are
// mutually exclusive variants of the lap race.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GameType {
    pub mode_name: String,
    pub lap_count: LapNumber,
    pub has_pickups: bool,

    pub is_score_collection_mode: bool,
    pub target_score: u32,
    pub score_time_limit: f64, // seconds

    pub has_time_limit: bool,
    pub time_limit_minutes: f64,
    pub warning_time_seconds: f64,

    pub allow_respawn: bool,
    pub show_lap_times: bool,
    pub show_position: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Practice,
    LapRace,
    ScoreCollection,
}

impl Default for GameType {
    fn default() -> Self {
        Self {
            mode_name: String::from("race"),
            lap_count: 3,
            has_pickups: true,
            is_score_collection_mode: false,
            target_score: 100,
            score_time_limit: 300.0,
            has_time_limit: true,
            time_limit_minutes: 6.0,
            warning_time_seconds: 30.0,
            allow_respawn: true,
            show_lap_times: true,
            show_position: true,
        }
    }
}

impl GameType {
    pub fn kind(&self) -> ModeKind {
        if self.is_score_collection_mode {
            ModeKind::ScoreCollection
        } else if self.lap_count == 0 {
            ModeKind::Practice
        } else {
            ModeKind::LapRace
        }
    }

    pub fn is_practice_mode(&self) -> bool {
        self.kind() == ModeKind::Practice
    }

    pub fn is_score_collection_mode(&self) -> bool {
        self.is_score_collection_mode
    }

    pub fn should_apply_time_limit(&self) -> bool {
        match self.kind() {
            ModeKind::ScoreCollection => self.score_time_limit > 0.0,
            ModeKind::Practice => false,
            ModeKind::LapRace => self.has_time_limit,
        }
    }

    pub fn effective_time_limit_secs(&self) -> f64 {
        if self.is_score_collection_mode {
            self.score_time_limit
        } else {
            self.time_limit_minutes * 60.0
        }
    }

    pub fn target_value(&self) -> u32 {
        if self.is_score_collection_mode {
            self.target_score
        } else {
            self.lap_count as u32
        }
    }

    pub fn progress_text(&self, current_value: u32) -> String {
        format!("{}/{}", current_value, self.target_value())
    }

    pub fn is_time_up(&self, remaining_secs: f64) -> bool {
        self.should_apply_time_limit() && remaining_secs <= 0.0
    }

    pub fn should_show_warning(&self, remaining_secs: f64) -> bool {
        self.should_apply_time_limit()
            && remaining_secs <= self.warning_time_seconds
            && remaining_secs > 0.0
    }

    pub fn builtin_catalogue() -> Vec<GameType> {
        vec![
            GameType {
                mode_name: String::from("practice"),
                lap_count: 0,
                has_time_limit: false,
                show_position: false,
                ..Default::default()
            },
            GameType::default(),
            GameType {
                mode_name: String::from("sprint"),
                lap_count: 1,
                has_time_limit: false,
                ..Default::default()
            },
            GameType {
                mode_name: String::from("score"),
                lap_count: 0,
                is_score_collection_mode: true,
                show_lap_times: false,
                ..Default::default()
            },
        ]
    }

    // reads a yaml list of game types, falling back to the built-in catalogue
    pub fn load_catalogue<P: AsRef<Path>>(path: P) -> Result<Vec<GameType>> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "no game type catalogue at {}, using built-in modes",
                path.display()
            );
            return Ok(Self::builtin_catalogue());
        }

        let text = fs::read_to_string(path)?;
        let catalogue: Vec<GameType> = serde_yaml::from_str(&text)?;
        info!("loaded {} game types from {}", catalogue.len(), path.display());
        Ok(catalogue)
    }

    pub fn find(catalogue: &[GameType], mode_name: &str) -> Result<GameType> {
        catalogue
            .iter()
            .find(|game_type| game_type.mode_name == mode_name)
            .cloned()
            .ok_or_else(|| RaceError::UnknownGameType(mode_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_variants_are_exclusive() {
        let catalogue = GameType::builtin_catalogue();
        let practice = GameType::find(&catalogue, "practice").unwrap();
        let score = GameType::find(&catalogue, "score").unwrap();
        let race = GameType::find(&catalogue, "race").unwrap();

        assert_eq!(practice.kind(), ModeKind::Practice);
        assert!(!practice.is_score_collection_mode());
        assert_eq!(score.kind(), ModeKind::ScoreCollection);
        assert!(!score.is_practice_mode());
        assert_eq!(race.kind(), ModeKind::LapRace);
    }

    #[test]
    fn test_time_limit_rules() {
        let race = GameType::default();
        assert!(race.should_apply_time_limit());
        assert_eq!(race.effective_time_limit_secs(), 360.0);
        assert!(race.should_show_warning(29.9));
        assert!(!race.should_show_warning(0.0));
        assert!(race.is_time_up(0.0));

        let practice = GameType {
            lap_count: 0,
            ..Default::default()
        };
        assert!(!practice.should_apply_time_limit());
        assert!(!practice.is_time_up(-5.0));

        let score = GameType {
            is_score_collection_mode: true,
            score_time_limit: 120.0,
            has_time_limit: false,
            ..Default::default()
        };
        assert!(score.should_apply_time_limit());
        assert_eq!(score.effective_time_limit_secs(), 120.0);
        assert_eq!(score.progress_text(40), "40/100");
    }

    #[test]
    fn test_unknown_mode() {
        let catalogue = GameType::builtin_catalogue();
        assert!(matches!(
            GameType::find(&catalogue, "battle"),
            Err(RaceError::UnknownGameType(_))
        ));
    }

    #[test]
    fn test_yaml_uses_defaults_for_missing_keys() {
        let catalogue: Vec<GameType> =
            serde_yaml::from_str("- mode_name: endurance\n  lap_count: 10\n").unwrap();
        assert_eq!(catalogue[0].lap_count, 10);
        assert!(catalogue[0].has_time_limit);
    }

    #[test]
    fn test_yaml_ignores_retired_keys() {
        let catalogue: Vec<GameType> =
            serde_yaml::from_str("- mode_name: coins\n  has_coins: true\n  lap_count: 2\n").unwrap();
        assert_eq!(catalogue[0].mode_name, "coins");
        assert_eq!(catalogue[0].lap_count, 2);
    }
}
