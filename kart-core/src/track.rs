use std::fs;
use std::path::Path;

use glam::DVec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{RaceError, Result};
use crate::player::lap_info::CheckpointIndex;
use crate::player::RacerID;

// "next expected" position before the race starts and right after a lap rolls
pub const FINISH_SENTINEL: CheckpointIndex = -1;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Placement3D {
    pub position: DVec3,
    pub forward: DVec3,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Checkpoint {
    pub index: CheckpointIndex,
    pub placement: Placement3D,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FinishLine {
    pub placement: Placement3D,
    // lets a test track complete laps without driving the checkpoints
    #[serde(default)]
    pub debug: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Track {
    pub track_name: String,
    pub checkpoints: Vec<Checkpoint>,
    pub finish_line: FinishLine,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crossing {
    Checkpoint(CheckpointIndex),
    FinishLine,
}

impl Crossing {
    pub fn from_index(index: CheckpointIndex) -> Self {
        if index == FINISH_SENTINEL {
            Crossing::FinishLine
        } else {
            Crossing::Checkpoint(index)
        }
    }
}

// Inbound from the overlap collaborator
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerEvent {
    pub racer: RacerID,
    pub crossing: Crossing,
    pub is_debug_force: bool,
}

impl Track {
    pub fn new(
        track_name: String,
        mut checkpoints: Vec<Checkpoint>,
        finish_line: FinishLine,
    ) -> Result<Self> {
        checkpoints.sort_by_key(|checkpoint| checkpoint.index);
        for (expected, checkpoint) in checkpoints.iter().enumerate() {
            if checkpoint.index != expected as CheckpointIndex {
                return Err(RaceError::InvalidTrack(format!(
                    "{}: expected checkpoint {} but found {}",
                    track_name, expected, checkpoint.index
                )));
            }
        }

        Ok(Self {
            track_name,
            checkpoints,
            finish_line,
        })
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn last_checkpoint_index(&self) -> CheckpointIndex {
        self.checkpoints.len() as CheckpointIndex - 1
    }

    // where a racer respawns given the last point they passed
    pub fn respawn_point(&self, checkpoint_index: CheckpointIndex) -> Option<Placement3D> {
        if checkpoint_index == FINISH_SENTINEL {
            return Some(self.finish_line.placement);
        }
        usize::try_from(checkpoint_index)
            .ok()
            .and_then(|index| self.checkpoints.get(index))
            .map(|checkpoint| checkpoint.placement)
    }

    // A small oval used when no track file is present
    pub fn builtin_oval() -> Self {
        let ring = [
            DVec3::new(60.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, 60.0),
            DVec3::new(-60.0, 0.0, 0.0),
        ];
        let checkpoints = ring
            .iter()
            .enumerate()
            .map(|(index, position)| Checkpoint {
                index: index as CheckpointIndex,
                placement: Placement3D {
                    position: *position,
                    forward: DVec3::new(-position.z, 0.0, position.x).normalize(),
                },
            })
            .collect();

        Self {
            track_name: String::from("oval"),
            checkpoints,
            finish_line: FinishLine {
                placement: Placement3D {
                    position: DVec3::new(0.0, 0.0, -60.0),
                    forward: DVec3::X,
                },
                debug: false,
            },
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("no track file at {}, using the built-in oval", path.display());
            return Ok(Self::builtin_oval());
        }

        let text = fs::read_to_string(path)?;
        let raw: Track = serde_json::from_str(&text)?;
        let track = Track::new(raw.track_name, raw.checkpoints, raw.finish_line)?;
        info!(
            "loaded track {} with {} checkpoints",
            track.track_name,
            track.checkpoint_count()
        );
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64) -> Placement3D {
        Placement3D {
            position: DVec3::new(x, 0.0, 0.0),
            forward: DVec3::Z,
        }
    }

    #[test]
    fn test_checkpoints_must_be_contiguous() {
        let finish_line = FinishLine {
            placement: at(0.0),
            debug: false,
        };
        let gap = vec![
            Checkpoint { index: 0, placement: at(1.0) },
            Checkpoint { index: 2, placement: at(2.0) },
        ];
        assert!(Track::new(String::from("gap"), gap, finish_line).is_err());

        let shuffled = vec![
            Checkpoint { index: 1, placement: at(2.0) },
            Checkpoint { index: 0, placement: at(1.0) },
        ];
        let track = Track::new(String::from("ok"), shuffled, finish_line).unwrap();
        assert_eq!(track.last_checkpoint_index(), 1);
        assert_eq!(track.checkpoints[0].placement, at(1.0));
    }

    #[test]
    fn test_respawn_point() {
        let track = Track::builtin_oval();
        assert_eq!(
            track.respawn_point(FINISH_SENTINEL),
            Some(track.finish_line.placement)
        );
        assert_eq!(
            track.respawn_point(1),
            Some(track.checkpoints[1].placement)
        );
        assert_eq!(track.respawn_point(17), None);
    }

    #[test]
    fn test_crossing_from_sentinel() {
        assert_eq!(Crossing::from_index(-1), Crossing::FinishLine);
        assert_eq!(Crossing::from_index(2), Crossing::Checkpoint(2));
    }
}
