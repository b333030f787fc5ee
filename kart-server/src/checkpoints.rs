use log::debug;

use kart_core::authority::Authority;
use kart_core::player::items::{ItemIndex, ItemSlot};
use kart_core::player::lap_info::{CheckpointIndex, LapCompleted, LapRules};
use kart_core::tick::{Tick, TickClock};
use kart_core::track::{Crossing, Track};

use crate::game::racer::RacerEntity;

// What a trigger needs from the tick it fires in
pub struct TriggerContext<'a> {
    pub authority: &'a Authority,
    pub clock: &'a TickClock,
    pub tick: Tick,
    pub rules: LapRules,
    pub is_debug_force: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    Ignored,
    CheckpointPassed(CheckpointIndex),
    LapCompleted(LapCompleted),
    ItemGranted { slot: ItemSlot, item: ItemIndex },
}

pub trait TriggerEntity {
    fn trigger(&mut self, racer: &mut RacerEntity, context: &TriggerContext) -> TriggerOutcome;
}

#[derive(Clone, Copy)]
pub struct Checkpoint {
    pub index: CheckpointIndex,
}

impl TriggerEntity for Checkpoint {
    fn trigger(&mut self, racer: &mut RacerEntity, context: &TriggerContext) -> TriggerOutcome {
        if racer
            .progress
            .process_checkpoint(context.authority, self.index, &context.rules)
        {
            TriggerOutcome::CheckpointPassed(self.index)
        } else {
            debug!("racer {} out of order at checkpoint {}", racer.id, self.index);
            TriggerOutcome::Ignored
        }
    }
}

#[derive(Clone, Copy)]
pub struct FinishLine {
    // test tracks can complete laps without the checkpoints
    pub debug: bool,
}

impl TriggerEntity for FinishLine {
    fn trigger(&mut self, racer: &mut RacerEntity, context: &TriggerContext) -> TriggerOutcome {
        let completed = racer.progress.process_finish_line(
            context.authority,
            self.debug || context.is_debug_force,
            context.tick,
            &context.rules,
        );

        match completed {
            Some(lap) => TriggerOutcome::LapCompleted(lap),
            None => TriggerOutcome::Ignored,
        }
    }
}

pub fn crossing_trigger(crossing: Crossing, track: &Track) -> Box<dyn TriggerEntity> {
    match crossing {
        Crossing::Checkpoint(index) => Box::new(Checkpoint { index }),
        Crossing::FinishLine => Box::new(FinishLine {
            debug: track.finish_line.debug,
        }),
    }
}
