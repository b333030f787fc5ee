use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::time::Duration;

use log::{debug, info, warn};

use kart_core::authority::{Authority, Role};
use kart_core::error::{RaceError, Result};
use kart_core::events::RaceEvent;
use kart_core::game_type::{GameType, ModeKind};
use kart_core::mode_clock::ModeClock;
use kart_core::networking::{ClientBoundPacket, ItemBoxID, ServerBoundPacket};
use kart_core::player::items::ItemUse;
use kart_core::player::lap_info::{LapNumber, LapRules, Placement, RaceProgress};
use kart_core::player::player_inputs::InputEvent;
use kart_core::player::RacerID;
use kart_core::sound_effect::SoundEffect;
use kart_core::sync::{ChangeDetector, ReplicatedEntity};
use kart_core::tick::{Tick, TickClock, TickTimer};
use kart_core::track::{Track, TriggerEvent};
use kart_core::GLOBAL_CONFIG;

use super::phase::GamePhase;
use super::powerup::pickups::ItemBox;
use super::powerup::PowerUp;
use super::racer::RacerEntity;
use super::registry::{lock_racer, RacerRegistry};
use crate::checkpoints::{crossing_trigger, TriggerContext, TriggerEntity, TriggerOutcome};
use crate::progress::standings;

#[cfg(test)]
mod tests;

// The racer hosting the match; lap-count requests from it count as the
// authority's own
pub const HOST_RACER: RacerID = 0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    pub expected_racers: usize,
    pub countdown_secs: f64,
    pub equip_item_timeout_secs: f64,
    pub time_up_grace_secs: f64,
    pub lobby_transition_delay_secs: f64,
    pub spinout_secs: f64,
    pub item_box_cooldown_secs: f64,
    pub boost_secs: f64,
}

impl Tuning {
    pub fn from_config() -> Self {
        Self {
            expected_racers: GLOBAL_CONFIG.player_amount,
            countdown_secs: GLOBAL_CONFIG.countdown_secs,
            equip_item_timeout_secs: GLOBAL_CONFIG.equip_item_timeout_secs,
            time_up_grace_secs: GLOBAL_CONFIG.time_up_grace_secs,
            lobby_transition_delay_secs: GLOBAL_CONFIG.lobby_transition_delay_secs,
            spinout_secs: GLOBAL_CONFIG.spinout_secs,
            item_box_cooldown_secs: GLOBAL_CONFIG.item_box_cooldown_secs,
            boost_secs: GLOBAL_CONFIG.boost_secs,
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            expected_racers: 1,
            countdown_secs: 3.0,
            equip_item_timeout_secs: 3.0,
            time_up_grace_secs: 3.0,
            lobby_transition_delay_secs: 0.5,
            spinout_secs: 2.0,
            item_box_cooldown_secs: 5.0,
            boost_secs: 1.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    All,
    Racer(RacerID),
}

/// One match on the authority: the phase machine, the match clock and the
/// racers' progress. Knows nothing about sockets; everything it has to say
/// is queued in the outbox for the server loop to deliver.
pub struct RaceSession {
    authority: Authority,
    clock: TickClock,
    tuning: Tuning,
    game_type: GameType,
    track: Track,

    registry: RacerRegistry,
    participants: BTreeSet<RacerID>,

    mode_clock: ModeClock,
    mode_replication: ChangeDetector<ModeClock>,

    item_boxes: BTreeMap<ItemBoxID, ItemBox>,
    phase: GamePhase,
    placements: BTreeMap<RacerID, Placement>,
    outbox: Vec<(Recipient, ClientBoundPacket)>,
}

impl RaceSession {
    pub fn new(
        game_type: GameType,
        track: Track,
        registry: RacerRegistry,
        clock: TickClock,
        tuning: Tuning,
    ) -> Result<Self> {
        let authority = Role::Authority.authority()?;
        let mode_clock = ModeClock::new(&game_type);
        info!(
            "hosting {} on {} ({} checkpoints)",
            game_type.mode_name,
            track.track_name,
            track.checkpoint_count()
        );

        Ok(Self {
            authority,
            clock,
            tuning,
            game_type,
            track,
            registry,
            participants: BTreeSet::new(),
            mode_replication: ChangeDetector::new(&mode_clock),
            mode_clock,
            item_boxes: BTreeMap::new(),
            phase: GamePhase::waiting(),
            placements: BTreeMap::new(),
            outbox: Vec::new(),
        })
    }

    pub fn registry(&self) -> &RacerRegistry {
        &self.registry
    }

    pub fn drain_outbox(&mut self) -> Vec<(Recipient, ClientBoundPacket)> {
        mem::take(&mut self.outbox)
    }

    fn send(&mut self, recipient: Recipient, packet: ClientBoundPacket) {
        self.outbox.push((recipient, packet));
    }

    fn broadcast_event(&mut self, event: RaceEvent) {
        self.send(Recipient::All, ClientBoundPacket::Event(event));
    }

    fn lap_rules(&self) -> LapRules {
        LapRules::new(
            &self.game_type,
            self.mode_clock.current_max_laps(&self.game_type),
            &self.track,
        )
    }

    fn progress_snapshot(&self) -> Vec<(RacerID, RaceProgress)> {
        self.registry
            .snapshot()
            .iter()
            .map(|(id, racer)| (*id, lock_racer(racer).progress.clone()))
            .collect()
    }

    pub fn join(&mut self, racer: RacerID) {
        self.participants.insert(racer);
        self.registry
            .spawn(RacerEntity::new(racer, self.game_type.kind()));

        self.send(Recipient::Racer(racer), ClientBoundPacket::PlayerNumber(racer));
        self.send(
            Recipient::Racer(racer),
            ClientBoundPacket::LoadGame {
                game_type: self.game_type.clone(),
                track: self.track.clone(),
            },
        );
    }

    pub fn leave(&mut self, racer: RacerID) {
        self.participants.remove(&racer);
        self.placements.remove(&racer);
        if let GamePhase::WaitingForPlayers { loaded } = &mut self.phase {
            loaded.remove(&racer);
        }

        if self.registry.despawn(racer).is_some() {
            self.send(Recipient::All, ClientBoundPacket::Despawn(racer));
        }
    }

    // handle one packet from a racer's connection
    pub fn handle_packet(&mut self, racer: RacerID, packet: ServerBoundPacket, now: Tick) {
        match packet {
            ServerBoundPacket::NotifyLoaded => self.on_loaded(racer),
            ServerBoundPacket::InputToggle(event) => self.handle_input(racer, event, now),
            ServerBoundPacket::TriggerOverlap {
                crossing,
                is_debug_force,
            } => self.handle_trigger(
                TriggerEvent {
                    racer,
                    crossing,
                    is_debug_force,
                },
                now,
            ),
            ServerBoundPacket::ItemBoxOverlap(item_box) => {
                self.handle_item_box(racer, item_box, now)
            }
            ServerBoundPacket::RequestLapIncrease(additional_laps) => {
                self.request_lap_increase(racer, additional_laps)
            }
            ServerBoundPacket::NextGame => self.next_game(now),
        }
    }

    fn on_loaded(&mut self, racer: RacerID) {
        // whoever loads late still needs everything replicated so far
        let mut snapshot = vec![(
            ReplicatedEntity::ModeClock,
            self.mode_replication.table().full_snapshot(&self.mode_clock),
        )];
        for (_, shared) in self.registry.snapshot() {
            snapshot.extend(lock_racer(&shared).full_snapshot());
        }
        for (entity, updates) in snapshot {
            self.send(
                Recipient::Racer(racer),
                ClientBoundPacket::FieldUpdates { entity, updates },
            );
        }

        if let GamePhase::WaitingForPlayers { loaded } = &mut self.phase {
            loaded.insert(racer);
        }
    }

    // one authoritative step, run once per server tick
    pub fn tick(&mut self, now: Tick) {
        match &self.phase {
            GamePhase::WaitingForPlayers { loaded } => {
                let everyone_loaded = !self.participants.is_empty()
                    && self.participants.len() >= self.tuning.expected_racers
                    && self.participants.iter().all(|racer| loaded.contains(racer));
                if everyone_loaded {
                    self.begin_countdown(now);
                }
            }
            GamePhase::CountingDownToGameStart { race_start } => {
                if now >= *race_start {
                    self.start_race(now);
                }
            }
            GamePhase::Playing => self.simulate_race(now),
            GamePhase::AllPlayersDone => {}
            GamePhase::ReturningToLobby { lobby_at } => {
                if lobby_at.expired(now) {
                    self.load_lobby();
                }
            }
        }

        self.replicate();
    }

    fn begin_countdown(&mut self, now: Tick) {
        let countdown_secs = self.tuning.countdown_secs.max(0.0);
        let race_start = now + self.clock.seconds_to_ticks(countdown_secs);
        info!("all racers loaded, starting in {}s", countdown_secs);

        self.phase = GamePhase::CountingDownToGameStart { race_start };
        self.send(
            Recipient::All,
            ClientBoundPacket::GameStart(Duration::from_secs_f64(countdown_secs)),
        );
        self.send(
            Recipient::All,
            ClientBoundPacket::SoundEffectEvent(SoundEffect::Countdown),
        );
    }

    fn start_race(&mut self, now: Tick) {
        self.mode_clock
            .start_race(&self.authority, self.clock.simulation_time(now));

        let kind = self.game_type.kind();
        for (_, shared) in self.registry.snapshot() {
            let mut racer = lock_racer(&shared);
            // score collection runs its own scoring, lap progress stays idle
            if kind != ModeKind::ScoreCollection {
                racer.progress.start_race(&self.authority, now, kind);
            }
            racer.input_enabled = true;
        }

        self.placements.clear();
        self.phase = GamePhase::Playing;
        info!("race started at tick {}", now);
    }

    fn simulate_race(&mut self, now: Tick) {
        for (_, shared) in self.registry.snapshot() {
            lock_racer(&shared).expire_effects(now);
        }

        let events = self.mode_clock.tick(
            &self.authority,
            now,
            &self.clock,
            &self.game_type,
            self.phase.is_playing(),
            self.tuning.time_up_grace_secs,
        );
        for event in events {
            match event {
                RaceEvent::TimeUp => {
                    self.broadcast_event(RaceEvent::TimeUp);
                    self.on_time_up(now);
                }
                RaceEvent::ReturnToLobby => {
                    self.begin_return_to_lobby(now);
                    return;
                }
                other => self.broadcast_event(other),
            }
        }

        self.update_standings(now);
    }

    fn update_standings(&mut self, now: Tick) {
        if self.game_type.kind() != ModeKind::LapRace {
            return;
        }

        let progress = self.progress_snapshot();
        let everyone_finished =
            !progress.is_empty() && progress.iter().all(|(_, racer)| racer.has_finished());

        for (racer, placement) in standings(progress) {
            if self.placements.insert(racer, placement) != Some(placement) {
                self.send(
                    Recipient::Racer(racer),
                    ClientBoundPacket::PlacementUpdate(placement),
                );
            }
        }

        // after time is up the mode clock still has to run out the grace window
        if everyone_finished && !self.mode_clock.is_time_up() {
            info!("every racer has finished");
            self.send_all_done(now);
            self.phase = GamePhase::AllPlayersDone;
        }
    }

    fn send_all_done(&mut self, now: Tick) {
        let ceiling = self.mode_clock.time_up_ceiling(&self.game_type);
        let placements = standings(self.progress_snapshot())
            .into_iter()
            .map(|(racer, placement)| {
                let total_time = self
                    .registry
                    .get(racer)
                    .map(|shared| {
                        lock_racer(&shared)
                            .progress
                            .total_race_time(&self.clock, now, ceiling)
                    })
                    .unwrap_or(0.0);
                (racer, placement, total_time)
            })
            .collect();

        self.send(Recipient::All, ClientBoundPacket::AllDone { placements });
    }

    // every racer stops where it is and no more input is taken
    fn on_time_up(&mut self, now: Tick) {
        let force_finish = self.game_type.kind() != ModeKind::ScoreCollection;
        for (_, shared) in self.registry.snapshot() {
            let mut racer = lock_racer(&shared);
            racer.spin_out(&self.clock, now, self.tuning.spinout_secs);
            racer.input_enabled = false;
            if force_finish && racer.progress.force_finish(&self.authority, now) {
                info!("racer {} did not finish in time", racer.id);
            }
        }

        self.send_all_done(now);
    }

    fn begin_return_to_lobby(&mut self, now: Tick) {
        self.broadcast_event(RaceEvent::ReturnToLobby);
        for racer in self.registry.clear() {
            self.send(Recipient::All, ClientBoundPacket::Despawn(racer));
        }

        let lobby_at =
            TickTimer::from_seconds(&self.clock, now, self.tuning.lobby_transition_delay_secs);
        self.phase = GamePhase::ReturningToLobby { lobby_at };
    }

    fn load_lobby(&mut self) {
        info!("back in the lobby");
        self.send(Recipient::All, ClientBoundPacket::LoadLobby);

        self.mode_clock.reset_game(&self.authority);
        self.placements.clear();
        self.item_boxes.clear();

        let kind = self.game_type.kind();
        for racer in self.participants.iter() {
            self.registry.spawn(RacerEntity::new(*racer, kind));
        }

        self.send(
            Recipient::All,
            ClientBoundPacket::LoadGame {
                game_type: self.game_type.clone(),
                track: self.track.clone(),
            },
        );
        self.phase = GamePhase::waiting();
    }

    fn next_game(&mut self, now: Tick) {
        if self.phase != GamePhase::AllPlayersDone {
            debug!("next game requested mid-race, ignoring");
            return;
        }

        self.mode_clock.reset_game(&self.authority);
        let kind = self.game_type.kind();
        for (_, shared) in self.registry.snapshot() {
            lock_racer(&shared).reset_for_new_race(&self.authority, kind);
        }
        self.placements.clear();
        self.item_boxes.clear();

        self.begin_countdown(now);
    }

    pub fn handle_trigger(&mut self, event: TriggerEvent, now: Tick) {
        if self.game_type.is_score_collection_mode() {
            return;
        }

        let shared = match self.registry.get(event.racer) {
            Some(shared) => shared,
            None => {
                warn!("trigger for racer {} who is not spawned", event.racer);
                return;
            }
        };

        let context = TriggerContext {
            authority: &self.authority,
            clock: &self.clock,
            tick: now,
            rules: self.lap_rules(),
            is_debug_force: event.is_debug_force,
        };
        let mut trigger = crossing_trigger(event.crossing, &self.track);
        let outcome = trigger.trigger(&mut lock_racer(&shared), &context);

        if let TriggerOutcome::CheckpointPassed(index) = outcome {
            debug!("racer {} passed checkpoint {}", event.racer, index);
        } else if let TriggerOutcome::LapCompleted(completed) = outcome {
            self.broadcast_event(RaceEvent::LapCompleted {
                racer: event.racer,
                lap: completed.lap,
                is_finish: completed.is_finish,
            });

            if completed.is_finish {
                let placement = standings(self.progress_snapshot())
                    .into_iter()
                    .find(|(racer, _)| *racer == event.racer)
                    .map(|(_, placement)| placement)
                    .unwrap_or(0);
                info!("racer {} finished in place {}", event.racer, placement);
                self.send(
                    Recipient::Racer(event.racer),
                    ClientBoundPacket::FinishedLaps(placement),
                );
            }
        }
    }

    fn handle_item_box(&mut self, racer: RacerID, item_box: ItemBoxID, now: Tick) {
        if !self.phase.is_playing() || !self.game_type.has_pickups {
            return;
        }

        let shared = match self.registry.get(racer) {
            Some(shared) => shared,
            None => return,
        };
        let mut racer = lock_racer(&shared);
        if !racer.input_enabled {
            return;
        }

        let rules = self.lap_rules();
        let (cooldown_secs, equip_secs) = (
            self.tuning.item_box_cooldown_secs,
            self.tuning.equip_item_timeout_secs,
        );
        let item_box = self
            .item_boxes
            .entry(item_box)
            .or_insert_with(|| ItemBox::new(cooldown_secs, equip_secs));

        let context = TriggerContext {
            authority: &self.authority,
            clock: &self.clock,
            tick: now,
            rules,
            is_debug_force: false,
        };
        if let TriggerOutcome::ItemGranted { slot, item } = item_box.trigger(&mut racer, &context) {
            debug!("racer {} got item {} in slot {}", racer.id, item, slot.number());
        }
    }

    pub fn handle_input(&mut self, racer_id: RacerID, event: InputEvent, now: Tick) {
        let shared = match self.registry.get(racer_id) {
            Some(shared) => shared,
            None => {
                warn!("input from racer {} who is not spawned", racer_id);
                return;
            }
        };

        // resolved after the racer is unlocked, effects may touch every racer
        let used = {
            let mut racer = lock_racer(&shared);
            if !racer.input_enabled {
                debug!("racer {} has no control right now", racer_id);
                return;
            }

            match event {
                InputEvent::SelectSlot(slot) => {
                    racer.items.set_current_slot(&self.authority, slot);
                    None
                }
                InputEvent::UseItem(_) | InputEvent::UseNextItem if racer.is_spun_out(now) => {
                    None
                }
                InputEvent::UseItem(slot) => Some(racer.items.use_item(&self.authority, slot, now)),
                InputEvent::UseNextItem => {
                    let (_, used) = racer.items.use_next_available(&self.authority, now);
                    Some(used)
                }
                InputEvent::ResetToCheckpoint => {
                    if !self.game_type.allow_respawn {
                        return;
                    }
                    match racer.progress.respawn_point(Some(&self.track)) {
                        Some(placement) => self.send(
                            Recipient::All,
                            ClientBoundPacket::Teleport {
                                racer: racer_id,
                                placement,
                            },
                        ),
                        None => warn!("no respawn point for racer {}", racer_id),
                    }
                    None
                }
            }
        };

        if let Some(used) = used {
            self.resolve_item_use(racer_id, used, now);
        }
    }

    fn resolve_item_use(&mut self, user: RacerID, used: ItemUse, now: Tick) {
        let index = match used {
            ItemUse::Used(index) => index,
            ItemUse::Horn => {
                self.send(
                    Recipient::All,
                    ClientBoundPacket::SoundEffectEvent(SoundEffect::Horn),
                );
                return;
            }
        };

        match PowerUp::from_index(index) {
            Some(PowerUp::Boost) => {
                if let Some(shared) = self.registry.get(user) {
                    let mut racer = lock_racer(&shared);
                    if racer.is_boosting(now) {
                        debug!("racer {} boosted again before the last one ran out", user);
                    }
                    racer.start_boost(&self.clock, now, self.tuning.boost_secs);
                }
            }
            // hazard placement is up to the vehicle simulation
            Some(PowerUp::OilSlick) => info!("racer {} dropped an oil slick", user),
            Some(PowerUp::Shockwave) => {
                for (racer, shared) in self.registry.snapshot() {
                    if racer == user {
                        continue;
                    }
                    lock_racer(&shared).spin_out(&self.clock, now, self.tuning.spinout_secs);
                    self.send(
                        Recipient::Racer(racer),
                        ClientBoundPacket::SoundEffectEvent(SoundEffect::Crash),
                    );
                }
            }
            None => warn!("racer {} used unknown item {}", user, index),
        }
    }

    pub fn request_lap_increase(&mut self, racer: RacerID, additional_laps: LapNumber) {
        if !self.phase.is_playing() {
            self.send(
                Recipient::Racer(racer),
                ClientBoundPacket::Event(RaceEvent::LapIncreaseFailed),
            );
            return;
        }

        let requester = if racer == HOST_RACER {
            Role::Authority
        } else {
            Role::Observer
        };

        match self
            .mode_clock
            .try_increase_lap_count(requester, additional_laps, &self.game_type)
        {
            Ok(event) => self.broadcast_event(event),
            Err(RaceError::NotAuthority) => {
                warn!("racer {} asked for more laps but is not hosting", racer);
                self.send(
                    Recipient::Racer(racer),
                    ClientBoundPacket::Event(RaceEvent::LapIncreaseFailed),
                );
            }
            Err(e) => {
                info!("lap increase refused: {}", e);
                self.broadcast_event(RaceEvent::LapIncreaseFailed);
            }
        }
    }

    // queues every field that changed this tick
    fn replicate(&mut self) {
        let mode_updates = self.mode_replication.collect_updates(&self.mode_clock);
        if !mode_updates.is_empty() {
            self.send(
                Recipient::All,
                ClientBoundPacket::FieldUpdates {
                    entity: ReplicatedEntity::ModeClock,
                    updates: mode_updates,
                },
            );
        }

        for (_, shared) in self.registry.snapshot() {
            let batches = lock_racer(&shared).collect_updates();
            for (entity, updates) in batches {
                self.send(
                    Recipient::All,
                    ClientBoundPacket::FieldUpdates { entity, updates },
                );
            }
        }
    }
}
