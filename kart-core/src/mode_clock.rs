use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::authority::{Authority, Role};
use crate::error::{RaceError, Result};
use crate::events::RaceEvent;
use crate::game_type::{GameType, ModeKind};
use crate::player::lap_info::{LapNumber, MAX_LAPS};
use crate::sync::{FieldTable, FieldValue, Synchronized};
use crate::tick::{Tick, TickClock, TickTimer};

/// Match-wide time limit and lap count, owned by the authority.
///
/// `time_warning_triggered`, `is_time_up` and `extra_lap_used` are latches:
/// they only go from false to true within a race and are cleared by
/// `start_race` / `reset_game`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModeClock {
    race_start_time: f64,
    time_warning_triggered: bool,
    is_time_up: bool,
    time_up_return_timer: TickTimer,
    current_max_laps: LapNumber,
    extra_lap_used: bool,

    // authority-local, never replicated
    base_max_laps: LapNumber,
    is_returning: bool,
}

impl ModeClock {
    pub fn new(game_type: &GameType) -> Self {
        Self {
            race_start_time: 0.0,
            time_warning_triggered: false,
            is_time_up: false,
            time_up_return_timer: TickTimer::NONE,
            current_max_laps: game_type.lap_count,
            extra_lap_used: false,
            base_max_laps: game_type.lap_count,
            is_returning: false,
        }
    }

    pub fn race_start_time(&self) -> f64 {
        self.race_start_time
    }

    pub fn time_warning_triggered(&self) -> bool {
        self.time_warning_triggered
    }

    pub fn is_time_up(&self) -> bool {
        self.is_time_up
    }

    pub fn time_up_return_timer(&self) -> TickTimer {
        self.time_up_return_timer
    }

    pub fn extra_lap_used(&self) -> bool {
        self.extra_lap_used
    }

    pub fn is_returning(&self) -> bool {
        self.is_returning
    }

    pub fn current_max_laps(&self, game_type: &GameType) -> LapNumber {
        if self.current_max_laps > 0 {
            self.current_max_laps
        } else {
            game_type.lap_count
        }
    }

    // the ceiling unfinished racers' times are capped at once time is up
    pub fn time_up_ceiling(&self, game_type: &GameType) -> Option<f64> {
        self.is_time_up
            .then(|| game_type.effective_time_limit_secs())
    }

    fn clear(&mut self) {
        self.race_start_time = 0.0;
        self.time_warning_triggered = false;
        self.is_time_up = false;
        self.time_up_return_timer = TickTimer::NONE;
        self.is_returning = false;
        self.current_max_laps = self.base_max_laps;
        self.extra_lap_used = false;
    }

    pub fn start_race(&mut self, _: &Authority, simulation_time: f64) {
        self.clear();
        self.race_start_time = simulation_time;
        info!("race clock started at {:.2}s", simulation_time);
    }

    pub fn reset_game(&mut self, _: &Authority) {
        self.clear();
    }

    pub fn remaining_time(&self, simulation_time: f64, game_type: &GameType, is_playing: bool) -> f64 {
        let total_time = game_type.effective_time_limit_secs();
        if !is_playing {
            return total_time;
        }

        if game_type.is_practice_mode() {
            return f64::MAX;
        }

        if self.race_start_time == 0.0 {
            return total_time;
        }

        let elapsed = simulation_time - self.race_start_time;
        (total_time - elapsed).max(0.0)
    }

    /// One authoritative step of the time limit. Returns the events to
    /// broadcast, each of which fires at most once per race.
    pub fn tick(
        &mut self,
        _: &Authority,
        now: Tick,
        clock: &TickClock,
        game_type: &GameType,
        is_playing: bool,
        grace_secs: f64,
    ) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        if !is_playing || !game_type.should_apply_time_limit() {
            return events;
        }

        let remaining = self.remaining_time(clock.simulation_time(now), game_type, is_playing);

        if !self.time_warning_triggered && game_type.should_show_warning(remaining) {
            self.time_warning_triggered = true;
            info!("{:.1}s left on the clock", remaining);
            events.push(RaceEvent::TimeWarning {
                remaining_secs: remaining,
            });
        }

        if !self.is_time_up && game_type.is_time_up(remaining) {
            self.is_time_up = true;
            self.time_up_return_timer = TickTimer::from_seconds(clock, now, grace_secs);
            info!("time is up");
            events.push(RaceEvent::TimeUp);
        }

        if self.is_time_up && self.time_up_return_timer.expired(now) && !self.is_returning {
            self.is_returning = true;
            info!("grace period over, returning to the lobby");
            events.push(RaceEvent::ReturnToLobby);
        }

        events
    }

    /// Grants one extra-lap extension per race. Anything else is a normal
    /// rejection the caller reports back as `LapIncreaseFailed`.
    pub fn try_increase_lap_count(
        &mut self,
        requester: Role,
        additional_laps: LapNumber,
        game_type: &GameType,
    ) -> Result<RaceEvent> {
        if !requester.is_authority() {
            return Err(RaceError::NotAuthority);
        }

        if self.extra_lap_used {
            debug!("extra lap already used this race");
            return Err(RaceError::ExtraLapAlreadyUsed);
        }

        if game_type.kind() != ModeKind::LapRace {
            return Err(RaceError::LapIncreaseUnsupported {
                mode: game_type.mode_name.clone(),
            });
        }

        let new_max = self
            .current_max_laps(game_type)
            .saturating_add(additional_laps)
            .min(MAX_LAPS);
        self.current_max_laps = new_max;
        self.extra_lap_used = true;
        info!("lap count increased by {}, now {}", additional_laps, new_max);

        Ok(RaceEvent::LapIncreased {
            added_laps: additional_laps,
            new_max,
        })
    }
}

impl Synchronized for ModeClock {
    fn register_fields(table: &mut FieldTable<Self>) {
        table
            .register(
                "race_start_time",
                |clock| FieldValue::Float(clock.race_start_time),
                |clock, value| clock.race_start_time = value.as_float(),
            )
            .register(
                "time_warning_triggered",
                |clock| FieldValue::Bool(clock.time_warning_triggered),
                |clock, value| clock.time_warning_triggered = value.as_bool(),
            )
            .register(
                "is_time_up",
                |clock| FieldValue::Bool(clock.is_time_up),
                |clock, value| clock.is_time_up = value.as_bool(),
            )
            .register(
                "time_up_return_timer",
                |clock| FieldValue::Int(clock.time_up_return_timer.to_raw()),
                |clock, value| clock.time_up_return_timer = TickTimer::from_raw(value.as_int()),
            )
            .register(
                "current_max_laps",
                |clock| FieldValue::Int(clock.current_max_laps as i64),
                |clock, value| clock.current_max_laps = value.as_int() as LapNumber,
            )
            .register(
                "extra_lap_used",
                |clock| FieldValue::Bool(clock.extra_lap_used),
                |clock, value| clock.extra_lap_used = value.as_bool(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 60;

    fn timed_race() -> GameType {
        GameType {
            time_limit_minutes: 6.0,
            warning_time_seconds: 30.0,
            ..Default::default()
        }
    }

    fn started_clock(game_type: &GameType) -> (ModeClock, Authority, TickClock) {
        let auth = Role::Authority.authority().unwrap();
        let clock = TickClock::new(RATE);
        let mut mode_clock = ModeClock::new(game_type);
        mode_clock.start_race(&auth, clock.simulation_time(1));
        (mode_clock, auth, clock)
    }

    // tick at which `elapsed` seconds have passed since a start at tick 1
    fn tick_after(elapsed: f64) -> Tick {
        1 + (elapsed * RATE as f64).round() as Tick
    }

    #[test]
    fn test_warning_fires_once() {
        let game_type = timed_race();
        let (mut mode_clock, auth, clock) = started_clock(&game_type);

        let early = mode_clock.tick(&auth, tick_after(320.0), &clock, &game_type, true, 3.0);
        assert!(early.is_empty());

        // 29.9 seconds left
        let events = mode_clock.tick(&auth, tick_after(330.1), &clock, &game_type, true, 3.0);
        assert_eq!(events.len(), 1);
        match &events[0] {
            RaceEvent::TimeWarning { remaining_secs } => {
                assert!((remaining_secs - 29.9).abs() < 1e-6)
            }
            other => panic!("expected a warning, got {:?}", other),
        }
        assert!(mode_clock.time_warning_triggered());

        let again = mode_clock.tick(&auth, tick_after(340.0), &clock, &game_type, true, 3.0);
        assert!(again.is_empty());
    }

    #[test]
    fn test_time_up_then_return_after_grace() {
        let game_type = timed_race();
        let (mut mode_clock, auth, clock) = started_clock(&game_type);
        mode_clock.tick(&auth, tick_after(331.0), &clock, &game_type, true, 3.0);

        // first tick past the six minute mark
        let up_tick = tick_after(360.0) + 1;
        let events = mode_clock.tick(&auth, up_tick, &clock, &game_type, true, 3.0);
        assert_eq!(events, vec![RaceEvent::TimeUp]);
        assert!(mode_clock.is_time_up());
        assert_eq!(mode_clock.time_up_ceiling(&game_type), Some(360.0));

        let during_grace = mode_clock.tick(&auth, up_tick + 179, &clock, &game_type, true, 3.0);
        assert!(during_grace.is_empty());

        let returning = mode_clock.tick(&auth, up_tick + 180, &clock, &game_type, true, 3.0);
        assert_eq!(returning, vec![RaceEvent::ReturnToLobby]);

        let after = mode_clock.tick(&auth, up_tick + 400, &clock, &game_type, true, 3.0);
        assert!(after.is_empty());
        assert!(mode_clock.is_time_up());
        assert!(mode_clock.time_warning_triggered());
    }

    #[test]
    fn test_late_first_tick_fires_warning_skipped_and_time_up() {
        let game_type = timed_race();
        let (mut mode_clock, auth, clock) = started_clock(&game_type);

        // remaining is already 0, which is not inside the warning window
        let events = mode_clock.tick(&auth, tick_after(400.0), &clock, &game_type, true, 3.0);
        assert_eq!(events, vec![RaceEvent::TimeUp]);
        assert!(!mode_clock.time_warning_triggered());
    }

    #[test]
    fn test_no_limit_or_not_playing_is_quiet() {
        let untimed = GameType {
            has_time_limit: false,
            ..Default::default()
        };
        let (mut mode_clock, auth, clock) = started_clock(&untimed);
        assert!(mode_clock
            .tick(&auth, tick_after(10_000.0), &clock, &untimed, true, 3.0)
            .is_empty());

        let game_type = timed_race();
        let (mut mode_clock, auth, clock) = started_clock(&game_type);
        assert!(mode_clock
            .tick(&auth, tick_after(10_000.0), &clock, &game_type, false, 3.0)
            .is_empty());
        assert!(!mode_clock.is_time_up());
    }

    #[test]
    fn test_remaining_time() {
        let game_type = timed_race();
        let mode_clock = ModeClock::new(&game_type);
        assert_eq!(mode_clock.remaining_time(50.0, &game_type, true), 360.0);
        assert_eq!(mode_clock.remaining_time(50.0, &game_type, false), 360.0);

        let (mode_clock, _, clock) = started_clock(&game_type);
        let now = clock.simulation_time(tick_after(60.0));
        assert!((mode_clock.remaining_time(now, &game_type, true) - 300.0).abs() < 1e-6);
        let way_later = clock.simulation_time(tick_after(1000.0));
        assert_eq!(mode_clock.remaining_time(way_later, &game_type, true), 0.0);

        let practice = GameType {
            lap_count: 0,
            ..Default::default()
        };
        assert_eq!(mode_clock.remaining_time(now, &practice, true), f64::MAX);
    }

    #[test]
    fn test_lap_increase_once_per_race() {
        let game_type = timed_race();
        let (mut mode_clock, auth, clock) = started_clock(&game_type);

        let first = mode_clock.try_increase_lap_count(Role::Authority, 2, &game_type);
        assert_eq!(
            first.unwrap(),
            RaceEvent::LapIncreased {
                added_laps: 2,
                new_max: 5
            }
        );
        assert_eq!(mode_clock.current_max_laps(&game_type), 5);

        let second = mode_clock.try_increase_lap_count(Role::Authority, 2, &game_type);
        assert!(matches!(second, Err(RaceError::ExtraLapAlreadyUsed)));
        assert_eq!(mode_clock.current_max_laps(&game_type), 5);

        // a new race restores the base lap count and the extension
        mode_clock.start_race(&auth, clock.simulation_time(tick_after(500.0)));
        assert_eq!(mode_clock.current_max_laps(&game_type), 3);
        assert!(!mode_clock.extra_lap_used());
    }

    #[test]
    fn test_lap_increase_stays_below_counter_limit() {
        let game_type = GameType {
            lap_count: 250,
            has_time_limit: false,
            ..Default::default()
        };
        let mut mode_clock = ModeClock::new(&game_type);

        let event = mode_clock.try_increase_lap_count(Role::Authority, 10, &game_type);
        assert_eq!(
            event.unwrap(),
            RaceEvent::LapIncreased {
                added_laps: 10,
                new_max: MAX_LAPS
            }
        );
        assert_eq!(mode_clock.current_max_laps(&game_type), 254);
    }

    #[test]
    fn test_lap_increase_rejections() {
        let game_type = timed_race();
        let mut mode_clock = ModeClock::new(&game_type);
        assert!(matches!(
            mode_clock.try_increase_lap_count(Role::Observer, 1, &game_type),
            Err(RaceError::NotAuthority)
        ));
        assert!(!mode_clock.extra_lap_used());

        let practice = GameType {
            lap_count: 0,
            ..Default::default()
        };
        let mut practice_clock = ModeClock::new(&practice);
        assert!(matches!(
            practice_clock.try_increase_lap_count(Role::Authority, 1, &practice),
            Err(RaceError::LapIncreaseUnsupported { .. })
        ));

        let score = GameType {
            is_score_collection_mode: true,
            ..Default::default()
        };
        let mut score_clock = ModeClock::new(&score);
        assert!(score_clock
            .try_increase_lap_count(Role::Authority, 1, &score)
            .is_err());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let game_type = timed_race();
        let (mut mode_clock, auth, clock) = started_clock(&game_type);
        mode_clock.tick(&auth, tick_after(400.0), &clock, &game_type, true, 3.0);
        mode_clock
            .try_increase_lap_count(Role::Authority, 1, &game_type)
            .unwrap();

        mode_clock.reset_game(&auth);
        let once = mode_clock.clone();
        mode_clock.reset_game(&auth);

        assert_eq!(mode_clock, once);
        assert_eq!(mode_clock, ModeClock::new(&game_type));
    }
}
