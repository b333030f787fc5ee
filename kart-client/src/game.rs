use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use log::{debug, info, warn};

use kart_core::error::Result;
use kart_core::events::{EventKind, RaceEvent};
use kart_core::networking::{ClientBoundPacket, ServerBoundPacket, ServerConnection};
use kart_core::player::RacerID;
use kart_core::presentation::Presentation;
use kart_core::tick::{Tick, TickClock, FIRST_TICK};
use kart_core::view::RaceView;
use kart_core::GLOBAL_CONFIG;

use crate::presenter::{placement_text, LogPresenter};

// keep retrying this long while the server comes up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GameClient {
    connection: ServerConnection,
    clock: TickClock,
    racer: Option<RacerID>,
    view: Option<RaceView>,
    presenter: LogPresenter,
    // the server tick the race started on and when we first saw it
    race_anchor: Option<(Tick, Instant)>,
}

impl GameClient {
    pub fn new(ip_addr: String) -> Result<GameClient> {
        let retry_policy = ExponentialBackoff {
            max_elapsed_time: Some(CONNECT_TIMEOUT),
            ..Default::default()
        };
        let stream = backoff::retry(retry_policy, || {
            TcpStream::connect(&ip_addr).map_err(|e| {
                debug!("server not reachable yet: {}", e);
                backoff::Error::transient(e)
            })
        })
        .map_err(|e| match e {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })?;
        info!("connected to game server at {}", ip_addr);

        Ok(GameClient {
            connection: ServerConnection::new(stream)?,
            clock: TickClock::new(GLOBAL_CONFIG.tick_rate),
            racer: None,
            view: None,
            presenter: LogPresenter::new(),
            race_anchor: None,
        })
    }

    // returns once the server hangs up
    pub fn start_loop(&mut self) -> Result<()> {
        let frame_duration = self.clock.tick_duration();

        loop {
            let start_time = Instant::now();

            self.connection.sync_incoming()?;
            while let Some(packet) = self.connection.pop_incoming() {
                self.handle_packet(packet);
            }
            if self.connection.is_closed() {
                info!("server closed the connection");
                return Ok(());
            }

            self.render();
            self.connection.sync_outgoing()?;

            if let Some(remaining) = frame_duration.checked_sub(start_time.elapsed()) {
                thread::sleep(remaining);
            }
        }
    }

    // estimates the server's tick from the replicated race start
    fn current_tick(&mut self) -> Tick {
        let race_start = match &self.view {
            Some(view) => view.mode_clock().race_start_time(),
            None => return FIRST_TICK,
        };
        if race_start <= 0.0 {
            self.race_anchor = None;
            return FIRST_TICK;
        }

        let clock = self.clock;
        let (start_tick, seen_at) = *self
            .race_anchor
            .get_or_insert_with(|| (clock.seconds_to_ticks(race_start), Instant::now()));
        start_tick + clock.seconds_to_ticks(seen_at.elapsed().as_secs_f64())
    }

    fn render(&mut self) {
        let now = self.current_tick();
        if let Some(view) = self.view.as_mut() {
            view.render(&mut self.presenter, now);
        }
    }

    fn load_game(&mut self, mut view: RaceView) {
        if let Some(racer) = self.racer {
            view.set_local_racer(racer);
        }
        view.subscribe(
            EventKind::LapCompleted,
            Box::new(|event: &RaceEvent| {
                if let RaceEvent::LapCompleted {
                    racer,
                    is_finish: true,
                    ..
                } = event
                {
                    info!("racer {} crossed the finish line", racer);
                }
            }),
        );

        self.view = Some(view);
        self.race_anchor = None;
        self.connection.push_outgoing(ServerBoundPacket::NotifyLoaded);
    }

    fn handle_packet(&mut self, packet: ClientBoundPacket) {
        match packet {
            ClientBoundPacket::PlayerNumber(racer) => {
                info!("joined as racer {}", racer);
                self.racer = Some(racer);
            }
            ClientBoundPacket::LoadGame { game_type, track } => {
                info!("loading {} on {}", game_type.mode_name, track.track_name);
                self.load_game(RaceView::new(game_type, Some(track), self.clock));
            }
            ClientBoundPacket::GameStart(countdown) => {
                info!("race starts in {:.1}s", countdown.as_secs_f64());
                self.race_anchor = None;
                if let Some(view) = self.view.as_mut() {
                    view.start_new_race();
                }
            }
            ClientBoundPacket::FieldUpdates { entity, updates } => match self.view.as_mut() {
                Some(view) => view.apply(entity, &updates),
                None => warn!("field updates for {:?} before the game loaded", entity),
            },
            ClientBoundPacket::Event(event) => {
                if let Some(view) = self.view.as_mut() {
                    view.receive_event(event);
                }
            }
            ClientBoundPacket::Teleport { racer, placement } => {
                debug!("racer {} respawned at {:?}", racer, placement.position)
            }
            ClientBoundPacket::SoundEffectEvent(effect) => self.presenter.play_cue(effect),
            ClientBoundPacket::PlacementUpdate(placement) => self.presenter.show_placement(placement),
            ClientBoundPacket::FinishedLaps(placement) => {
                info!("finished the race in {} place", placement_text(placement))
            }
            ClientBoundPacket::AllDone { placements } => {
                info!("final standings:");
                for (racer, placement, total_time) in placements {
                    info!(
                        "  {} racer {} ({:.2}s)",
                        placement_text(placement),
                        racer,
                        total_time
                    );
                }
            }
            ClientBoundPacket::Despawn(racer) => {
                if let Some(view) = self.view.as_mut() {
                    view.despawn(racer);
                }
            }
            ClientBoundPacket::LoadLobby => {
                info!("back in the lobby");
                self.view = None;
                self.race_anchor = None;
            }
        }
    }
}
