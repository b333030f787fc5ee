use std::io::{Read, Write};
use std::time::Duration;

use bincode::{DefaultOptions, Options, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::events::RaceEvent;
use crate::game_type::GameType;
use crate::player::{
    lap_info::{LapNumber, Placement},
    player_inputs::InputEvent,
    RacerID,
};
use crate::sound_effect::SoundEffect;
use crate::sync::{FieldUpdate, ReplicatedEntity};
use crate::track::{Crossing, Placement3D, Track};

pub type ItemBoxID = usize;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ServerBoundPacket {
    // Before game
    NotifyLoaded,

    // During game
    InputToggle(InputEvent),
    // Reported by the overlap collaborator; the racer is whoever sent it
    TriggerOverlap {
        crossing: Crossing,
        is_debug_force: bool,
    },
    ItemBoxOverlap(ItemBoxID),
    RequestLapIncrease(LapNumber),

    // After game
    NextGame,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ClientBoundPacket {
    // Before game
    PlayerNumber(RacerID),

    // Load into the game
    LoadGame { game_type: GameType, track: Track },

    // Pre-game
    GameStart(#[serde(with = "serde_millis")] Duration), // How long until the race starts?

    // During game
    FieldUpdates {
        entity: ReplicatedEntity,
        updates: Vec<FieldUpdate>,
    },
    Event(RaceEvent),
    Teleport {
        racer: RacerID,
        placement: Placement3D,
    },
    SoundEffectEvent(SoundEffect),
    PlacementUpdate(Placement), // What place in the race are you now at?
    FinishedLaps(Placement),    // You completed all laps, what place are you?

    // After game
    AllDone {
        // (racer, place, total race seconds)
        placements: Vec<(RacerID, Placement, f64)>,
    },
    Despawn(RacerID),
    LoadLobby,
}

pub trait Packet: Serialize + DeserializeOwned {
    fn parse_packet<R: Read>(reader: &mut R) -> Result<Self> {
        DefaultOptions::new().deserialize_from(reader)
    }
    fn packet_size(&self) -> Result<u64> {
        DefaultOptions::new().serialized_size(self)
    }
    fn write_packet<W: Write>(&self, write: &mut W) -> Result<()> {
        DefaultOptions::new().serialize_into(write, self)
    }
}

impl Packet for ClientBoundPacket {}
impl Packet for ServerBoundPacket {}
