use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::authority::Authority;
use crate::game_type::{GameType, ModeKind};
use crate::sync::{FieldTable, FieldValue, Synchronized};
use crate::tick::{Tick, TickClock};
use crate::track::{Placement3D, Track, FINISH_SENTINEL};

pub type LapNumber = u8;
pub type CheckpointIndex = i32;
pub type Placement = u8;

pub const LAP_TICKS_CAPACITY: usize = 5;

// one below the top so the lap counter can still roll past the last lap
pub const MAX_LAPS: LapNumber = LapNumber::MAX - 1;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaceState {
    NotStarted,
    Racing,
    Finished,
}

// What the lap machine needs to know about the match it runs in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LapRules {
    pub kind: ModeKind,
    pub max_laps: LapNumber,
    pub last_checkpoint_index: CheckpointIndex,
}

impl LapRules {
    pub fn new(game_type: &GameType, max_laps: LapNumber, track: &Track) -> Self {
        Self {
            kind: game_type.kind(),
            max_laps: max_laps.min(MAX_LAPS),
            last_checkpoint_index: track.last_checkpoint_index(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LapCompleted {
    pub lap: LapNumber,
    pub is_finish: bool,
}

/// Per-racer progress through checkpoints and laps.
///
/// Out-of-order, repeated or skipped crossings are dropped without an error;
/// the trigger collaborator may deliver them late or twice. Once
/// `end_race_tick` is set the record is terminal until reset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RaceProgress {
    lap: LapNumber,
    checkpoint_index: CheckpointIndex,
    lap_ticks: [Tick; LAP_TICKS_CAPACITY],
    start_race_tick: Tick,
    end_race_tick: Tick,
}

impl RaceProgress {
    pub fn new(kind: ModeKind) -> Self {
        Self {
            lap: Self::initial_lap(kind),
            checkpoint_index: FINISH_SENTINEL,
            lap_ticks: [0; LAP_TICKS_CAPACITY],
            start_race_tick: 0,
            end_race_tick: 0,
        }
    }

    fn initial_lap(kind: ModeKind) -> LapNumber {
        match kind {
            ModeKind::LapRace => 1,
            ModeKind::Practice | ModeKind::ScoreCollection => 0,
        }
    }

    pub fn lap(&self) -> LapNumber {
        self.lap
    }

    pub fn checkpoint_index(&self) -> CheckpointIndex {
        self.checkpoint_index
    }

    pub fn lap_ticks(&self) -> &[Tick; LAP_TICKS_CAPACITY] {
        &self.lap_ticks
    }

    pub fn start_race_tick(&self) -> Tick {
        self.start_race_tick
    }

    pub fn end_race_tick(&self) -> Tick {
        self.end_race_tick
    }

    pub fn has_finished(&self) -> bool {
        self.end_race_tick != 0
    }

    pub fn state(&self) -> RaceState {
        if self.has_finished() {
            RaceState::Finished
        } else if self.start_race_tick != 0 {
            RaceState::Racing
        } else {
            RaceState::NotStarted
        }
    }

    pub fn start_race(&mut self, _: &Authority, tick: Tick, kind: ModeKind) -> bool {
        if self.state() != RaceState::NotStarted {
            return false;
        }

        self.start_race_tick = tick;
        self.lap = Self::initial_lap(kind);
        self.checkpoint_index = FINISH_SENTINEL;
        true
    }

    // returns whether the crossing was accepted
    pub fn process_checkpoint(
        &mut self,
        _: &Authority,
        index: CheckpointIndex,
        rules: &LapRules,
    ) -> bool {
        // indices come off the wire, anything outside the track is noise
        if !(FINISH_SENTINEL..=rules.last_checkpoint_index).contains(&index) {
            debug!("checkpoint {} is not on this track", index);
            return false;
        }

        match rules.kind {
            ModeKind::ScoreCollection => return false,
            // only tracked so practice drivers can respawn where they were
            ModeKind::Practice => {
                let changed = self.checkpoint_index != index;
                self.checkpoint_index = index;
                return changed;
            }
            ModeKind::LapRace => {}
        }

        if self.state() != RaceState::Racing {
            return false;
        }

        if index.checked_sub(1) == Some(self.checkpoint_index) {
            self.checkpoint_index = index;
            return true;
        }
        false
    }

    pub fn process_finish_line(
        &mut self,
        _: &Authority,
        is_debug_force: bool,
        tick: Tick,
        rules: &LapRules,
    ) -> Option<LapCompleted> {
        match rules.kind {
            ModeKind::ScoreCollection => return None,
            ModeKind::Practice => {
                self.checkpoint_index = FINISH_SENTINEL;
                return None;
            }
            ModeKind::LapRace => {}
        }

        if self.state() != RaceState::Racing {
            return None;
        }

        // every checkpoint has to be visited before the lap counts
        if self.checkpoint_index != rules.last_checkpoint_index && !is_debug_force {
            return None;
        }

        // lap 0 means the race never really started for this racer
        if self.lap == 0 || self.lap > rules.max_laps {
            return None;
        }

        let slot = self.lap as usize - 1;
        if slot < LAP_TICKS_CAPACITY && self.lap_ticks[slot] == 0 {
            self.lap_ticks[slot] = tick;
        }

        self.lap += 1;
        self.checkpoint_index = FINISH_SENTINEL;

        let is_finish = self.lap - 1 == rules.max_laps;
        if is_finish && self.end_race_tick == 0 {
            self.end_race_tick = tick;
        }
        debug!("lap completed: {}/{}", self.lap - 1, rules.max_laps);

        Some(LapCompleted {
            lap: self.lap,
            is_finish,
        })
    }

    /// Ends the race for this racer where it stands, filling any lap stamps
    /// still missing from the current lap onward so the total time can be
    /// computed.
    pub fn force_finish(&mut self, _: &Authority, tick: Tick) -> bool {
        if self.has_finished() {
            return false;
        }

        self.end_race_tick = tick;

        let from = (self.lap as usize).saturating_sub(1).min(LAP_TICKS_CAPACITY);
        for stamp in self.lap_ticks[from..].iter_mut() {
            if *stamp == 0 {
                *stamp = tick;
            }
        }
        true
    }

    pub fn reset_for_new_race(&mut self, _: &Authority, kind: ModeKind) {
        *self = Self::new(kind);
    }

    /// Seconds spent racing. A match clock that ran out caps every
    /// unfinished racer at the time limit.
    pub fn total_race_time(
        &self,
        clock: &TickClock,
        now: Tick,
        time_up_ceiling: Option<f64>,
    ) -> f64 {
        if self.start_race_tick == 0 {
            return 0.0;
        }

        if !self.has_finished() {
            if let Some(ceiling) = time_up_ceiling {
                return ceiling;
            }
        }

        let end_tick = if self.has_finished() {
            self.end_race_tick
        } else {
            now
        };
        clock.ticks_to_seconds(end_tick as i64 - self.start_race_tick as i64)
    }

    pub fn lap_time(&self, lap_index: usize, clock: &TickClock) -> f64 {
        let lap_tick = match self.lap_ticks.get(lap_index) {
            Some(&tick) if tick != 0 => tick,
            _ => return 0.0,
        };

        let previous_tick = if lap_index == 0 {
            self.start_race_tick
        } else {
            self.lap_ticks[lap_index - 1]
        };
        clock.ticks_to_seconds(lap_tick as i64 - previous_tick as i64)
    }

    // fraction of the current lap, the finish line counting as one more point
    pub fn lap_progress(&self, track: Option<&Track>) -> f64 {
        let track = match track {
            Some(track) => track,
            None => {
                warn!("no current track, reporting no lap progress");
                return 0.0;
            }
        };

        let total_checkpoints = track.checkpoint_count();
        if total_checkpoints == 0 {
            return 0.0;
        }

        (self.checkpoint_index + 1) as f64 / (total_checkpoints + 1) as f64
    }

    pub fn race_completion_percentage(&self, track: Option<&Track>, rules: &LapRules) -> f64 {
        if rules.kind != ModeKind::LapRace || rules.max_laps == 0 {
            return 0.0;
        }

        let completed_laps = self.lap.saturating_sub(1) as f64;
        (completed_laps + self.lap_progress(track)) / rules.max_laps as f64 * 100.0
    }

    pub fn is_last_lap(&self, rules: &LapRules) -> bool {
        rules.kind == ModeKind::LapRace && self.lap == rules.max_laps
    }

    pub fn respawn_point(&self, track: Option<&Track>) -> Option<Placement3D> {
        match track {
            Some(track) => track.respawn_point(self.checkpoint_index),
            None => {
                warn!("no current track, cannot reset to checkpoint");
                None
            }
        }
    }

    // "lap/max", never showing a lap past the last one
    pub fn lap_text(&self, max_laps: LapNumber) -> String {
        format!("{}/{}", self.lap.min(max_laps), max_laps)
    }
}

impl Synchronized for RaceProgress {
    fn register_fields(table: &mut FieldTable<Self>) {
        table
            .register(
                "lap",
                |progress| FieldValue::Int(progress.lap as i64),
                |progress, value| progress.lap = value.as_int() as LapNumber,
            )
            .register(
                "checkpoint_index",
                |progress| FieldValue::Int(progress.checkpoint_index as i64),
                |progress, value| progress.checkpoint_index = value.as_int() as CheckpointIndex,
            )
            .register(
                "lap_ticks",
                |progress| FieldValue::Ticks(progress.lap_ticks.to_vec()),
                |progress, value| {
                    let ticks = value.as_ticks();
                    for (slot, stamp) in progress.lap_ticks.iter_mut().enumerate() {
                        *stamp = ticks.get(slot).copied().unwrap_or(0);
                    }
                },
            )
            .register(
                "start_race_tick",
                |progress| FieldValue::Int(progress.start_race_tick as i64),
                |progress, value| progress.start_race_tick = value.as_int() as Tick,
            )
            .register(
                "end_race_tick",
                |progress| FieldValue::Int(progress.end_race_tick as i64),
                |progress, value| progress.end_race_tick = value.as_int() as Tick,
            );
    }
}
