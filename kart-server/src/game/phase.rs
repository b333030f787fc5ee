use std::collections::BTreeSet;

use kart_core::player::RacerID;
use kart_core::tick::{Tick, TickTimer};

#[derive(Clone, Debug, PartialEq)]
pub enum GamePhase {
    // Racers are connected and loading the track; nothing moves until every
    // one of them has reported in
    WaitingForPlayers { loaded: BTreeSet<RacerID> },
    // Racers can see the track and each other, with a countdown until their
    // controls unlock
    CountingDownToGameStart { race_start: Tick },
    Playing,
    // Show standings; a NextGame request restarts the race
    AllPlayersDone,
    // Time ran out and the grace window passed; racers are gone and the
    // lobby loads once the timer fires
    ReturningToLobby { lobby_at: TickTimer },
}

impl GamePhase {
    pub fn waiting() -> Self {
        GamePhase::WaitingForPlayers {
            loaded: BTreeSet::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, GamePhase::Playing)
    }
}
