use std::collections::BTreeMap;
use std::net::TcpListener;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};

use kart_core::error::Result;
use kart_core::game_type::GameType;
use kart_core::networking::ClientConnection;
use kart_core::player::RacerID;
use kart_core::tick::{Tick, TickClock, FIRST_TICK};
use kart_core::track::Track;
use kart_core::GLOBAL_CONFIG;

use self::registry::RacerRegistry;
use self::session::{RaceSession, Recipient, Tuning};

mod phase;
pub mod powerup;
pub mod racer;
pub mod registry;
mod session;

pub struct GameServer {
    listener: TcpListener,
    connections: BTreeMap<RacerID, ClientConnection>,
    next_racer: RacerID,
    session: RaceSession,
    clock: TickClock,
    tick: Tick,
}

impl GameServer {
    pub fn new(ip_addr: String) -> Result<GameServer> {
        // start the TCP listening service
        let listener = TcpListener::bind(&ip_addr)?;
        info!("game server now listening on {}", ip_addr);

        let catalogue = GameType::load_catalogue(&GLOBAL_CONFIG.game_types_path)?;
        let game_type = GameType::find(&catalogue, &GLOBAL_CONFIG.game_type)?;
        let track = Track::load(&GLOBAL_CONFIG.track_path)?;
        let clock = TickClock::new(GLOBAL_CONFIG.tick_rate);

        let session = RaceSession::new(
            game_type,
            track,
            RacerRegistry::new(),
            clock,
            Tuning::from_config(),
        )?;

        Ok(GameServer {
            listener,
            connections: BTreeMap::new(),
            next_racer: 0,
            session,
            clock,
            tick: FIRST_TICK,
        })
    }

    // WARNING: this function only returns on a socket failure
    pub fn start_loop(&mut self) -> Result<()> {
        let max_server_tick_duration = self.clock.tick_duration();

        loop {
            // don't actually loop if we don't have the minimum players
            self.block_until_minimum_connections()?;

            let start_time = Instant::now();

            self.fetch_incoming_packets();
            self.process_incoming_packets();
            self.session.tick(self.tick);
            self.deliver_outgoing_packets();

            self.tick += 1;

            // wait until server tick time has elapsed
            match max_server_tick_duration.checked_sub(start_time.elapsed()) {
                Some(remaining_tick_duration) => thread::sleep(remaining_tick_duration),
                None => warn!("tick {} ran longer than {:?}", self.tick - 1, max_server_tick_duration),
            }
        }
    }

    // blocks the primary loop if we don't have the minimum players
    fn block_until_minimum_connections(&mut self) -> Result<()> {
        while self.connections.len() < GLOBAL_CONFIG.player_amount {
            match self.listener.accept() {
                Ok((socket, addr)) => {
                    let racer = self.next_racer;
                    self.next_racer += 1;
                    info!("new connection from {}, racer {}", addr.ip(), racer);

                    self.connections.insert(racer, ClientConnection::new(socket)?);
                    self.session.join(racer);
                    info!("{} racer(s) on the grid", self.session.registry().len());
                }
                Err(e) => warn!("couldn't get connecting client info {:?}", e),
            }
        }
        Ok(())
    }

    fn drop_connections(&mut self, lost: Vec<RacerID>) {
        for racer in lost {
            self.connections.remove(&racer);
            self.session.leave(racer);
        }
        if self.session.registry().is_empty() {
            info!("no racers left, waiting for connections");
        }
    }

    // poll every connection and queue what arrived
    fn fetch_incoming_packets(&mut self) {
        let mut lost = Vec::new();
        for (racer, connection) in self.connections.iter_mut() {
            match connection.sync_incoming() {
                Ok(()) if connection.is_closed() => lost.push(*racer),
                Ok(()) => {}
                Err(e) => {
                    warn!("dropping racer {}: {}", racer, e);
                    lost.push(*racer);
                }
            }
        }

        if !lost.is_empty() {
            self.drop_connections(lost);
        }
    }

    // handle every packet in received order
    fn process_incoming_packets(&mut self) {
        for (racer, connection) in self.connections.iter_mut() {
            while let Some(packet) = connection.pop_incoming() {
                self.session.handle_packet(*racer, packet, self.tick);
            }
        }
    }

    fn deliver_outgoing_packets(&mut self) {
        for (recipient, packet) in self.session.drain_outbox() {
            match recipient {
                Recipient::All => {
                    for connection in self.connections.values_mut() {
                        connection.push_outgoing(packet.clone());
                    }
                }
                Recipient::Racer(racer) => match self.connections.get_mut(&racer) {
                    Some(connection) => connection.push_outgoing(packet),
                    None => debug!("racer {} left before a packet reached them", racer),
                },
            }
        }

        // empty outgoing packet queue and send to clients
        let mut lost = Vec::new();
        for (racer, connection) in self.connections.iter_mut() {
            if let Err(e) = connection.sync_outgoing() {
                warn!("dropping racer {}: {}", racer, e);
                lost.push(*racer);
            }
        }

        if !lost.is_empty() {
            self.drop_connections(lost);
        }
    }
}
