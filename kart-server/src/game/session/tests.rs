use super::*;
use kart_core::player::items::{ItemSlot, EMPTY_ITEM};
use kart_core::player::lap_info::RaceState;
use kart_core::track::Crossing;

fn session_for(game_type: GameType) -> RaceSession {
    RaceSession::new(
        game_type,
        Track::builtin_oval(),
        RacerRegistry::new(),
        TickClock::new(60),
        Tuning::default(),
    )
    .unwrap()
}

fn untimed_race() -> GameType {
    GameType {
        has_time_limit: false,
        ..Default::default()
    }
}

fn events(packets: &[(Recipient, ClientBoundPacket)]) -> Vec<RaceEvent> {
    packets
        .iter()
        .filter_map(|(_, packet)| match packet {
            ClientBoundPacket::Event(event) => Some(event.clone()),
            _ => None,
        })
        .collect()
}

// joins and loads the racers, then runs the countdown; returns the tick the
// race started on
fn start_race(session: &mut RaceSession, racers: &[RacerID]) -> Tick {
    for racer in racers {
        session.join(*racer);
        session.handle_packet(*racer, ServerBoundPacket::NotifyLoaded, 1);
    }

    let mut now = 1;
    while !session.phase.is_playing() {
        session.tick(now);
        now += 1;
    }
    session.drain_outbox();
    now - 1
}

fn cross(session: &mut RaceSession, racer: RacerID, crossing: Crossing, now: Tick) {
    session.handle_packet(
        racer,
        ServerBoundPacket::TriggerOverlap {
            crossing,
            is_debug_force: false,
        },
        now,
    );
}

fn drive_lap(session: &mut RaceSession, racer: RacerID, now: Tick) {
    for index in 0..3 {
        cross(session, racer, Crossing::Checkpoint(index), now);
    }
    cross(session, racer, Crossing::FinishLine, now);
}

fn progress(session: &RaceSession, racer: RacerID) -> RaceProgress {
    lock_racer(&session.registry.get(racer).unwrap())
        .progress
        .clone()
}

#[test]
fn test_countdown_then_race() {
    let mut session = session_for(untimed_race());
    session.join(0);
    session.handle_packet(0, ServerBoundPacket::NotifyLoaded, 1);
    session.drain_outbox();

    session.tick(1);
    assert_eq!(
        session.phase,
        GamePhase::CountingDownToGameStart { race_start: 181 }
    );
    assert!(session.drain_outbox().contains(&(
        Recipient::All,
        ClientBoundPacket::GameStart(Duration::from_secs(3))
    )));

    session.tick(180);
    assert_eq!(progress(&session, 0).state(), RaceState::NotStarted);
    session.tick(181);
    assert!(session.phase.is_playing());
    assert_eq!(progress(&session, 0).start_race_tick(), 181);
}

#[test]
fn test_three_laps_then_standings() {
    let mut session = session_for(untimed_race());
    let start = start_race(&mut session, &[0]);

    for lap in 1..=3 {
        drive_lap(&mut session, 0, start + lap * 600);
    }
    let packets = session.drain_outbox();
    assert_eq!(
        events(&packets),
        vec![
            RaceEvent::LapCompleted {
                racer: 0,
                lap: 2,
                is_finish: false
            },
            RaceEvent::LapCompleted {
                racer: 0,
                lap: 3,
                is_finish: false
            },
            RaceEvent::LapCompleted {
                racer: 0,
                lap: 4,
                is_finish: true
            },
        ]
    );
    assert!(packets.contains(&(Recipient::Racer(0), ClientBoundPacket::FinishedLaps(1))));
    assert_eq!(progress(&session, 0).end_race_tick(), start + 1800);

    session.tick(start + 1801);
    assert_eq!(session.phase, GamePhase::AllPlayersDone);
    assert!(session.drain_outbox().iter().any(|(_, packet)| matches!(
        packet,
        ClientBoundPacket::AllDone { placements }
            if placements.len() == 1 && placements[0].0 == 0 && placements[0].1 == 1
    )));

    session.handle_packet(0, ServerBoundPacket::NextGame, start + 1802);
    assert!(matches!(
        session.phase,
        GamePhase::CountingDownToGameStart { .. }
    ));
    assert_eq!(progress(&session, 0).state(), RaceState::NotStarted);
}

#[test]
fn test_time_up_forces_finish_then_returns_to_lobby() {
    let game_type = GameType {
        time_limit_minutes: 0.5,
        warning_time_seconds: 10.0,
        ..Default::default()
    };
    let mut session = session_for(game_type);
    let start = start_race(&mut session, &[0, 1]);
    drive_lap(&mut session, 0, start + 300);

    let mut packets = Vec::new();
    for now in start + 1..start + 1900 {
        session.tick(now);
        packets.extend(session.drain_outbox());
    }

    let seen = events(&packets);
    let warnings = seen
        .iter()
        .filter(|event| matches!(event, RaceEvent::TimeWarning { .. }))
        .count();
    assert_eq!(warnings, 1);
    assert_eq!(seen.iter().filter(|event| **event == RaceEvent::TimeUp).count(), 1);
    assert!(!seen.contains(&RaceEvent::ReturnToLobby));
    assert!(packets
        .iter()
        .any(|(_, packet)| matches!(packet, ClientBoundPacket::AllDone { .. })));

    // both racers stopped where they were, lap stamps filled in from their current lap
    let leader = progress(&session, 0);
    let time_up_tick = leader.end_race_tick();
    assert!(time_up_tick > start + 1700);
    assert_eq!(leader.lap_ticks()[0], start + 300);
    assert!(leader.lap_ticks()[1..].iter().all(|tick| *tick == time_up_tick));
    let trailing = progress(&session, 1);
    assert_eq!(trailing.end_race_tick(), time_up_tick);
    assert!(trailing.lap_ticks().iter().all(|tick| *tick == time_up_tick));

    // no more input once time is up
    session.handle_packet(
        1,
        ServerBoundPacket::InputToggle(InputEvent::UseNextItem),
        start + 1900,
    );
    assert!(session.drain_outbox().is_empty());

    let mut packets = Vec::new();
    for now in start + 1900..start + 2100 {
        session.tick(now);
        packets.extend(session.drain_outbox());
    }
    assert_eq!(events(&packets), vec![RaceEvent::ReturnToLobby]);
    assert!(packets.contains(&(Recipient::All, ClientBoundPacket::Despawn(0))));
    assert!(packets.contains(&(Recipient::All, ClientBoundPacket::Despawn(1))));
    assert!(packets.contains(&(Recipient::All, ClientBoundPacket::LoadLobby)));

    assert_eq!(session.phase, GamePhase::waiting());
    assert_eq!(session.registry.ids(), vec![0, 1]);
    assert!(!session.mode_clock.is_time_up());
}

#[test]
fn test_lap_increase_host_only_and_once() {
    let mut session = session_for(untimed_race());
    start_race(&mut session, &[0, 1]);

    session.handle_packet(1, ServerBoundPacket::RequestLapIncrease(1), 200);
    assert_eq!(
        session.drain_outbox(),
        vec![(
            Recipient::Racer(1),
            ClientBoundPacket::Event(RaceEvent::LapIncreaseFailed)
        )]
    );

    session.handle_packet(0, ServerBoundPacket::RequestLapIncrease(2), 200);
    session.handle_packet(0, ServerBoundPacket::RequestLapIncrease(2), 201);
    assert_eq!(
        session.drain_outbox(),
        vec![
            (
                Recipient::All,
                ClientBoundPacket::Event(RaceEvent::LapIncreased {
                    added_laps: 2,
                    new_max: 5
                })
            ),
            (
                Recipient::All,
                ClientBoundPacket::Event(RaceEvent::LapIncreaseFailed)
            ),
        ]
    );
    assert_eq!(session.mode_clock.current_max_laps(&session.game_type), 5);
}

#[test]
fn test_shockwave_spins_out_everyone_else() {
    let mut session = session_for(untimed_race());
    let start = start_race(&mut session, &[0, 1]);
    {
        let shared = session.registry.get(0).unwrap();
        let mut racer = lock_racer(&shared);
        racer.items.equip(
            &session.authority,
            ItemSlot::Secondary,
            PowerUp::Shockwave.index(),
            TickTimer::NONE,
        );
    }

    session.handle_packet(
        0,
        ServerBoundPacket::InputToggle(InputEvent::UseItem(ItemSlot::Secondary)),
        start + 10,
    );
    assert_eq!(
        session.drain_outbox(),
        vec![(
            Recipient::Racer(1),
            ClientBoundPacket::SoundEffectEvent(SoundEffect::Crash)
        )]
    );
    assert!(lock_racer(&session.registry.get(1).unwrap()).is_spun_out(start + 10));
    assert!(!lock_racer(&session.registry.get(0).unwrap()).is_spun_out(start + 10));
    assert_eq!(
        lock_racer(&session.registry.get(0).unwrap())
            .items
            .item(ItemSlot::Secondary),
        EMPTY_ITEM
    );

    // nothing happens while spun out, afterwards an empty hand honks
    session.handle_packet(
        1,
        ServerBoundPacket::InputToggle(InputEvent::UseNextItem),
        start + 11,
    );
    assert!(session.drain_outbox().is_empty());
    session.handle_packet(
        1,
        ServerBoundPacket::InputToggle(InputEvent::UseNextItem),
        start + 131,
    );
    assert_eq!(
        session.drain_outbox(),
        vec![(
            Recipient::All,
            ClientBoundPacket::SoundEffectEvent(SoundEffect::Horn)
        )]
    );
}

#[test]
fn test_score_mode_leaves_progress_alone() {
    let score = GameType::find(&GameType::builtin_catalogue(), "score").unwrap();
    let mut session = session_for(score);
    let start = start_race(&mut session, &[0]);

    drive_lap(&mut session, 0, start + 100);
    assert!(events(&session.drain_outbox()).is_empty());
    assert_eq!(
        progress(&session, 0),
        RaceProgress::new(ModeKind::ScoreCollection)
    );
}

#[test]
fn test_loading_racer_gets_full_snapshot() {
    let mut session = session_for(untimed_race());
    session.join(0);
    session.drain_outbox();

    session.handle_packet(0, ServerBoundPacket::NotifyLoaded, 1);
    let entities: Vec<ReplicatedEntity> = session
        .drain_outbox()
        .into_iter()
        .filter_map(|(recipient, packet)| match packet {
            ClientBoundPacket::FieldUpdates { entity, .. } if recipient == Recipient::Racer(0) => {
                Some(entity)
            }
            _ => None,
        })
        .collect();

    assert_eq!(
        entities,
        vec![
            ReplicatedEntity::ModeClock,
            ReplicatedEntity::Progress(0),
            ReplicatedEntity::Items(0)
        ]
    );
}

#[test]
fn test_only_changed_fields_are_replicated() {
    let mut session = session_for(untimed_race());
    let start = start_race(&mut session, &[0]);

    session.tick(start + 1);
    session.drain_outbox();
    session.tick(start + 2);
    assert!(session.drain_outbox().is_empty());

    cross(&mut session, 0, Crossing::Checkpoint(0), start + 3);
    session.tick(start + 3);
    let packets = session.drain_outbox();
    assert_eq!(packets.len(), 1);
    match &packets[0] {
        (Recipient::All, ClientBoundPacket::FieldUpdates { entity, updates }) => {
            assert_eq!(*entity, ReplicatedEntity::Progress(0));
            assert_eq!(updates.len(), 1);
        }
        other => panic!("expected a field update, got {:?}", other),
    }
}

#[test]
fn test_bogus_checkpoint_from_client_is_dropped() {
    let mut session = session_for(untimed_race());
    let start = start_race(&mut session, &[0]);

    for index in [i32::MIN, i32::MAX, 3] {
        cross(&mut session, 0, Crossing::Checkpoint(index), start + 1);
    }
    assert!(events(&session.drain_outbox()).is_empty());
    assert_eq!(progress(&session, 0).checkpoint_index(), -1);

    drive_lap(&mut session, 0, start + 600);
    assert_eq!(progress(&session, 0).lap(), 2);
}
