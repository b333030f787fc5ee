use std::collections::{BTreeMap, HashSet};
use std::mem;

use log::{debug, info, warn};

use crate::events::{EventBus, EventKind, Listener, RaceEvent};
use crate::game_type::{GameType, ModeKind};
use crate::mode_clock::ModeClock;
use crate::player::items::{ItemSlot, ItemSlots, EMPTY_ITEM};
use crate::player::lap_info::{LapNumber, RaceProgress};
use crate::player::RacerID;
use crate::presentation::Presentation;
use crate::sound_effect::SoundEffect;
use crate::sync::{ChangeDetector, FieldUpdate, Mirror, ReplicatedEntity};
use crate::tick::{Tick, TickClock};
use crate::track::Track;

struct RacerView {
    progress: Mirror<RaceProgress>,
    progress_changes: ChangeDetector<RaceProgress>,
    items: Mirror<ItemSlots>,
    item_changes: ChangeDetector<ItemSlots>,
}

impl RacerView {
    fn new(game_type: &GameType) -> Self {
        let progress = RaceProgress::new(game_type.kind());
        let items = ItemSlots::default();
        Self {
            progress_changes: ChangeDetector::new(&progress),
            progress: Mirror::new(progress),
            item_changes: ChangeDetector::new(&items),
            items: Mirror::new(items),
        }
    }
}

// one-shot presentation latches, cleared when a new race starts
#[derive(Default)]
struct Latches {
    warning_shown: bool,
    time_up_shown: bool,
    returning: bool,
    completed_laps: HashSet<(RacerID, LapNumber)>,
}

fn latch(flag: &mut bool) -> bool {
    !mem::replace(flag, true)
}

/// A participant's read-only picture of the match.
///
/// Replicated field updates land in mirrors; `render` diffs each mirror
/// against what was last presented and drives the `Presentation` once per
/// change. Broadcast events go through `receive_event`, which drops
/// duplicates, so a redelivered event or an event that races its own
/// replicated field never presents twice.
pub struct RaceView {
    game_type: GameType,
    track: Option<Track>,
    clock: TickClock,
    local_racer: Option<RacerID>,
    racers: BTreeMap<RacerID, RacerView>,

    mode_clock: Mirror<ModeClock>,
    mode_changes: ChangeDetector<ModeClock>,
    known_max_laps: LapNumber,

    latches: Latches,
    pending: Vec<RaceEvent>,
    last_time_fill: Option<f64>,
    bus: EventBus,
}

impl RaceView {
    pub fn new(game_type: GameType, track: Option<Track>, clock: TickClock) -> Self {
        let mode_clock = ModeClock::new(&game_type);
        Self {
            known_max_laps: game_type.lap_count,
            mode_changes: ChangeDetector::new(&mode_clock),
            mode_clock: Mirror::new(mode_clock),
            game_type,
            track,
            clock,
            local_racer: None,
            racers: BTreeMap::new(),
            latches: Latches::default(),
            pending: Vec::new(),
            last_time_fill: None,
            bus: EventBus::new(),
        }
    }

    pub fn set_local_racer(&mut self, racer: RacerID) {
        self.local_racer = Some(racer);
    }

    pub fn local_racer(&self) -> Option<RacerID> {
        self.local_racer
    }

    pub fn game_type(&self) -> &GameType {
        &self.game_type
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn mode_clock(&self) -> &ModeClock {
        self.mode_clock.get()
    }

    pub fn max_laps(&self) -> LapNumber {
        self.known_max_laps
    }

    pub fn progress(&self, racer: RacerID) -> Option<&RaceProgress> {
        self.racers.get(&racer).map(|view| view.progress.get())
    }

    pub fn items(&self, racer: RacerID) -> Option<&ItemSlots> {
        self.racers.get(&racer).map(|view| view.items.get())
    }

    pub fn racers(&self) -> impl Iterator<Item = RacerID> + '_ {
        self.racers.keys().copied()
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) {
        self.bus.subscribe(kind, listener);
    }

    pub fn is_playing(&self) -> bool {
        self.mode_clock.get().race_start_time() > 0.0 && !self.latches.returning
    }

    pub fn remaining_time(&self, now: Tick) -> f64 {
        self.mode_clock.get().remaining_time(
            self.clock.simulation_time(now),
            &self.game_type,
            self.is_playing(),
        )
    }

    pub fn apply(&mut self, entity: ReplicatedEntity, updates: &[FieldUpdate]) {
        match entity {
            ReplicatedEntity::ModeClock => self.mode_clock.apply(updates),
            ReplicatedEntity::Progress(racer) => {
                let game_type = &self.game_type;
                self.racers
                    .entry(racer)
                    .or_insert_with(|| RacerView::new(game_type))
                    .progress
                    .apply(updates);
            }
            ReplicatedEntity::Items(racer) => {
                let game_type = &self.game_type;
                self.racers
                    .entry(racer)
                    .or_insert_with(|| RacerView::new(game_type))
                    .items
                    .apply(updates);
            }
        }
    }

    pub fn despawn(&mut self, racer: RacerID) {
        if self.racers.remove(&racer).is_none() {
            debug!("despawn for unknown racer {}", racer);
        }
    }

    pub fn start_new_race(&mut self) {
        self.latches = Latches::default();
        self.pending.clear();
        self.last_time_fill = None;
    }

    /// Returns whether the event was new. Accepted events reach subscribers
    /// right away and the presentation on the next render.
    pub fn receive_event(&mut self, event: RaceEvent) -> bool {
        let is_new = match &event {
            RaceEvent::LapCompleted { racer, lap, .. } => {
                self.latches.completed_laps.insert((*racer, *lap))
            }
            RaceEvent::TimeWarning { .. } => latch(&mut self.latches.warning_shown),
            RaceEvent::TimeUp => latch(&mut self.latches.time_up_shown),
            RaceEvent::ReturnToLobby => latch(&mut self.latches.returning),
            RaceEvent::LapIncreased { new_max, .. } => {
                if *new_max > self.known_max_laps {
                    self.known_max_laps = *new_max;
                    true
                } else {
                    false
                }
            }
            RaceEvent::LapIncreaseFailed => true,
        };

        if !is_new {
            debug!("ignoring repeated {:?}", event.kind());
            return false;
        }

        self.bus.publish(&event);
        self.pending.push(event);
        true
    }

    pub fn render(&mut self, presentation: &mut dyn Presentation, now: Tick) {
        self.render_mode_clock(presentation, now);

        for event in mem::take(&mut self.pending) {
            self.present_event(presentation, &event);
        }

        self.render_racers(presentation, now);
        self.render_time_bar(presentation, now);
    }

    fn render_mode_clock(&mut self, presentation: &mut dyn Presentation, now: Tick) {
        let changed = self.mode_changes.detect_changes(self.mode_clock.get());
        for field in changed {
            match field {
                "current_max_laps" => {
                    self.known_max_laps = self.mode_clock.get().current_max_laps(&self.game_type);
                    self.refresh_lap_text(presentation);
                }
                // the replicated latch stands in for an event that never arrived
                "time_warning_triggered" if self.mode_clock.get().time_warning_triggered() => {
                    let remaining_secs = self.remaining_time(now);
                    self.receive_event(RaceEvent::TimeWarning { remaining_secs });
                }
                "is_time_up" if self.mode_clock.get().is_time_up() => {
                    self.receive_event(RaceEvent::TimeUp);
                }
                _ => {}
            }
        }
    }

    fn present_event(&mut self, presentation: &mut dyn Presentation, event: &RaceEvent) {
        match event {
            RaceEvent::LapCompleted {
                racer,
                lap,
                is_finish,
            } => {
                if Some(*racer) != self.local_racer {
                    debug!("racer {} is on lap {}", racer, lap);
                    return;
                }
                let cue = if *is_finish {
                    SoundEffect::RaceFinished
                } else {
                    SoundEffect::NextLap
                };
                presentation.play_cue(cue);
            }
            RaceEvent::TimeWarning { remaining_secs } => {
                presentation.show_time_warning(*remaining_secs);
                presentation.play_cue(SoundEffect::TimeWarning);
            }
            RaceEvent::TimeUp => {
                presentation.show_time_up();
                presentation.play_cue(SoundEffect::TimeUp);
            }
            RaceEvent::ReturnToLobby => {
                presentation.hide_end_race_screen();
                presentation.hide_racers();
            }
            RaceEvent::LapIncreased { added_laps, new_max } => {
                info!("{} extra lap(s), race is now {} laps", added_laps, new_max);
                self.refresh_lap_text(presentation);
            }
            RaceEvent::LapIncreaseFailed => info!("lap increase request was rejected"),
        }
    }

    fn render_racers(&mut self, presentation: &mut dyn Presentation, now: Tick) {
        let local_racer = self.local_racer;
        let show_laps = self.game_type.kind() == ModeKind::LapRace;
        let max_laps = self.known_max_laps;
        let ceiling = self.mode_clock.get().time_up_ceiling(&self.game_type);

        for (id, racer) in self.racers.iter_mut() {
            // every racer's baseline moves forward, only the local one is shown
            let progress_fields = racer.progress_changes.detect_changes(racer.progress.get());
            let item_fields = racer.item_changes.detect_changes(racer.items.get());
            if Some(*id) != local_racer {
                continue;
            }

            let progress = racer.progress.get();
            for field in progress_fields {
                match field {
                    "lap" if show_laps => presentation.set_lap_count(&progress.lap_text(max_laps)),
                    "checkpoint_index" if progress.checkpoint_index() >= 0 => {
                        presentation.play_cue(SoundEffect::Checkpoint)
                    }
                    "end_race_tick" => {
                        if progress.has_finished() {
                            let total_time = progress.total_race_time(&self.clock, now, ceiling);
                            presentation.show_end_race_screen(total_time);
                        } else {
                            presentation.hide_end_race_screen();
                        }
                    }
                    _ => {}
                }
            }

            let items = racer.items.get();
            for field in item_fields {
                let slot = match field {
                    "secondary_item" => ItemSlot::Secondary,
                    "tertiary_item" => ItemSlot::Tertiary,
                    "quaternary_item" => ItemSlot::Quaternary,
                    "current_slot" => {
                        presentation.select_slot(items.current_slot());
                        continue;
                    }
                    _ => continue,
                };

                let item = items.item(slot);
                presentation.refresh_slot_icon(slot, item);
                if item != EMPTY_ITEM {
                    presentation.play_cue(SoundEffect::ItemCollect);
                }
            }
        }
    }

    fn render_time_bar(&mut self, presentation: &mut dyn Presentation, now: Tick) {
        if !self.game_type.should_apply_time_limit() || !self.is_playing() {
            return;
        }

        let limit = self.game_type.effective_time_limit_secs();
        if limit <= 0.0 {
            warn!("time limit configured without a duration");
            return;
        }

        let fill = (self.remaining_time(now) / limit).clamp(0.0, 1.0);
        if self.last_time_fill != Some(fill) {
            self.last_time_fill = Some(fill);
            presentation.set_time_bar(fill);
        }
    }

    fn refresh_lap_text(&self, presentation: &mut dyn Presentation) {
        if self.game_type.kind() != ModeKind::LapRace {
            return;
        }

        let local_progress = self.local_racer.and_then(|racer| self.progress(racer));
        if let Some(progress) = local_progress {
            presentation.set_lap_count(&progress.lap_text(self.known_max_laps));
        }
    }
}
