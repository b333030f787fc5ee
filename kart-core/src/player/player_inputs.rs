use serde::{Deserialize, Serialize};

use super::items::ItemSlot;

// Discrete actions a racer's input collaborator reports for a tick. Steering
// and throttle belong to the vehicle simulation and never reach this crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    UseItem(ItemSlot),
    UseNextItem,
    SelectSlot(ItemSlot),
    ResetToCheckpoint,
}
