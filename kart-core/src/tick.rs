use std::time::Duration;

use serde::{Deserialize, Serialize};

// Simulation ticks start at 1; a stored tick of 0 means "never happened"
pub type Tick = u32;

pub const FIRST_TICK: Tick = 1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickClock {
    tick_rate: u32,
}

impl TickClock {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_rate: tick_rate.max(1),
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn delta_time(&self) -> f64 {
        1.0 / self.tick_rate as f64
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delta_time())
    }

    pub fn ticks_to_seconds(&self, ticks: i64) -> f64 {
        ticks_to_seconds(ticks, self.delta_time())
    }

    // rounds up so a deadline never fires early
    pub fn seconds_to_ticks(&self, seconds: f64) -> Tick {
        if seconds <= 0.0 {
            return 0;
        }
        (seconds * self.tick_rate as f64).ceil() as Tick
    }

    // authoritative wall-clock basis used by the mode clock
    pub fn simulation_time(&self, tick: Tick) -> f64 {
        self.ticks_to_seconds(tick as i64)
    }
}

pub fn ticks_to_seconds(ticks: i64, tick_duration_secs: f64) -> f64 {
    ticks as f64 * tick_duration_secs
}

/// A deadline expressed in ticks. Polled against the current tick, never
/// fires on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickTimer {
    target_tick: Option<Tick>,
}

impl TickTimer {
    pub const NONE: TickTimer = TickTimer { target_tick: None };

    pub fn from_ticks(now: Tick, ticks: Tick) -> Self {
        Self {
            target_tick: Some(now.saturating_add(ticks)),
        }
    }

    pub fn from_seconds(clock: &TickClock, now: Tick, seconds: f64) -> Self {
        Self::from_ticks(now, clock.seconds_to_ticks(seconds))
    }

    pub fn target_tick(&self) -> Option<Tick> {
        self.target_tick
    }

    pub fn is_running(&self) -> bool {
        self.target_tick.is_some()
    }

    pub fn expired(&self, now: Tick) -> bool {
        matches!(self.target_tick, Some(target) if now >= target)
    }

    pub fn expired_or_not_running(&self, now: Tick) -> bool {
        self.target_tick.map_or(true, |target| now >= target)
    }

    pub fn remaining_ticks(&self, now: Tick) -> Option<Tick> {
        self.target_tick.map(|target| target.saturating_sub(now))
    }

    pub fn remaining_seconds(&self, clock: &TickClock, now: Tick) -> Option<f64> {
        self.remaining_ticks(now)
            .map(|ticks| clock.ticks_to_seconds(ticks as i64))
    }

    // replicated as a single integer, -1 when not running
    pub fn to_raw(&self) -> i64 {
        self.target_tick.map_or(-1, |target| target as i64)
    }

    pub fn from_raw(raw: i64) -> Self {
        Self {
            target_tick: (raw >= 0).then(|| raw as Tick),
        }
    }
}
