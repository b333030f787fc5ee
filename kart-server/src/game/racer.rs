use log::debug;

use kart_core::authority::Authority;
use kart_core::game_type::ModeKind;
use kart_core::player::items::ItemSlots;
use kart_core::player::lap_info::RaceProgress;
use kart_core::player::RacerID;
use kart_core::sync::{ChangeDetector, FieldUpdate, ReplicatedEntity};
use kart_core::tick::{Tick, TickClock, TickTimer};

/// Everything the authority keeps for one racer. The progress and item
/// records are replicated field by field; the effect deadlines stay here.
pub struct RacerEntity {
    pub id: RacerID,
    pub progress: RaceProgress,
    pub items: ItemSlots,

    pub input_enabled: bool,
    pub spinout: TickTimer,
    pub boost: TickTimer,

    progress_replication: ChangeDetector<RaceProgress>,
    items_replication: ChangeDetector<ItemSlots>,
}

impl RacerEntity {
    pub fn new(id: RacerID, kind: ModeKind) -> Self {
        let progress = RaceProgress::new(kind);
        let items = ItemSlots::default();
        Self {
            id,
            progress_replication: ChangeDetector::new(&progress),
            items_replication: ChangeDetector::new(&items),
            progress,
            items,
            input_enabled: false,
            spinout: TickTimer::NONE,
            boost: TickTimer::NONE,
        }
    }

    pub fn is_spun_out(&self, now: Tick) -> bool {
        self.spinout.is_running() && !self.spinout.expired(now)
    }

    pub fn is_boosting(&self, now: Tick) -> bool {
        self.boost.is_running() && !self.boost.expired(now)
    }

    pub fn spin_out(&mut self, clock: &TickClock, now: Tick, seconds: f64) {
        debug!("racer {} spun out for {}s", self.id, seconds);
        self.spinout = TickTimer::from_seconds(clock, now, seconds);
        self.boost = TickTimer::NONE;
    }

    pub fn start_boost(&mut self, clock: &TickClock, now: Tick, seconds: f64) {
        self.boost = TickTimer::from_seconds(clock, now, seconds);
    }

    // drops deadlines that have passed
    pub fn expire_effects(&mut self, now: Tick) {
        if self.spinout.expired(now) {
            debug!("racer {} recovered from spin-out", self.id);
            self.spinout = TickTimer::NONE;
        }
        if self.boost.expired(now) {
            self.boost = TickTimer::NONE;
        }
    }

    pub fn reset_for_new_race(&mut self, authority: &Authority, kind: ModeKind) {
        self.progress.reset_for_new_race(authority, kind);
        self.items.clear(authority);
        self.input_enabled = false;
        self.spinout = TickTimer::NONE;
        self.boost = TickTimer::NONE;
    }

    // field updates since the last call, one batch per replicated record
    pub fn collect_updates(&mut self) -> Vec<(ReplicatedEntity, Vec<FieldUpdate>)> {
        let mut batches = Vec::new();

        let progress_updates = self.progress_replication.collect_updates(&self.progress);
        if !progress_updates.is_empty() {
            batches.push((ReplicatedEntity::Progress(self.id), progress_updates));
        }

        let item_updates = self.items_replication.collect_updates(&self.items);
        if !item_updates.is_empty() {
            batches.push((ReplicatedEntity::Items(self.id), item_updates));
        }

        batches
    }

    // every field, for a participant that just finished loading
    pub fn full_snapshot(&self) -> Vec<(ReplicatedEntity, Vec<FieldUpdate>)> {
        vec![
            (
                ReplicatedEntity::Progress(self.id),
                self.progress_replication.table().full_snapshot(&self.progress),
            ),
            (
                ReplicatedEntity::Items(self.id),
                self.items_replication.table().full_snapshot(&self.items),
            ),
        ]
    }
}
