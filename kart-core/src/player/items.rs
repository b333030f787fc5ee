use serde::{Deserialize, Serialize};

use crate::authority::Authority;
use crate::sync::{FieldTable, FieldValue, Synchronized};
use crate::tick::{Tick, TickTimer};

pub type ItemIndex = i32;

pub const EMPTY_ITEM: ItemIndex = -1;

// Slot 1 (the old "primary" slot) is reserved; the numbering is kept so
// slot ids stay stable on the wire.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemSlot {
    Secondary = 1,
    Tertiary = 2,
    Quaternary = 3,
}

impl ItemSlot {
    // the order "use next" and pickups walk the slots in
    pub const PRIORITY: [ItemSlot; 3] =
        [ItemSlot::Secondary, ItemSlot::Tertiary, ItemSlot::Quaternary];

    pub fn from_number(number: i32) -> Self {
        match number.clamp(1, 3) {
            1 => ItemSlot::Secondary,
            2 => ItemSlot::Tertiary,
            _ => ItemSlot::Quaternary,
        }
    }

    pub fn number(self) -> i32 {
        self as i32
    }

    fn offset(self) -> usize {
        self as usize - 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemUse {
    Used(ItemIndex),
    // nothing usable, the caller plays the horn instead
    Horn,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemSlots {
    items: [ItemIndex; 3],
    equip_cooldowns: [TickTimer; 3],
    current_slot: ItemSlot,
}

impl Default for ItemSlots {
    fn default() -> Self {
        Self {
            items: [EMPTY_ITEM; 3],
            equip_cooldowns: [TickTimer::NONE; 3],
            current_slot: ItemSlot::Secondary,
        }
    }
}

impl ItemSlots {
    pub fn item(&self, slot: ItemSlot) -> ItemIndex {
        self.items[slot.offset()]
    }

    pub fn equip_cooldown(&self, slot: ItemSlot) -> TickTimer {
        self.equip_cooldowns[slot.offset()]
    }

    pub fn current_slot(&self) -> ItemSlot {
        self.current_slot
    }

    pub fn has_empty_slot(&self) -> bool {
        self.items.iter().any(|item| *item == EMPTY_ITEM)
    }

    pub fn are_all_slots_full(&self) -> bool {
        !self.has_empty_slot()
    }

    pub fn set_current_slot(&mut self, _: &Authority, slot: ItemSlot) {
        self.current_slot = slot;
    }

    /// Puts an item in a slot, replacing whatever was there, and starts the
    /// wait before it can be used. The wait runs from acquisition, not use.
    pub fn equip(&mut self, _: &Authority, slot: ItemSlot, item: ItemIndex, cooldown: TickTimer) {
        self.items[slot.offset()] = item;
        self.equip_cooldowns[slot.offset()] = cooldown;
    }

    // pickup placement: first empty slot in order, else the selected one
    pub fn pickup_slot(&self) -> ItemSlot {
        ItemSlot::PRIORITY
            .iter()
            .copied()
            .find(|slot| self.item(*slot) == EMPTY_ITEM)
            .unwrap_or(self.current_slot)
    }

    pub fn can_use(&self, slot: ItemSlot, now: Tick) -> bool {
        self.item(slot) != EMPTY_ITEM && self.equip_cooldown(slot).expired_or_not_running(now)
    }

    pub fn use_item(&mut self, _: &Authority, slot: ItemSlot, now: Tick) -> ItemUse {
        if !self.can_use(slot, now) {
            return ItemUse::Horn;
        }

        let item = self.item(slot);
        self.items[slot.offset()] = EMPTY_ITEM;
        ItemUse::Used(item)
    }

    pub fn use_next_available(&mut self, authority: &Authority, now: Tick) -> (Option<ItemSlot>, ItemUse) {
        match ItemSlot::PRIORITY
            .iter()
            .copied()
            .find(|slot| self.can_use(*slot, now))
        {
            Some(slot) => (Some(slot), self.use_item(authority, slot, now)),
            None => (None, ItemUse::Horn),
        }
    }

    pub fn clear(&mut self, _: &Authority) {
        *self = Self::default();
    }
}

fn register_slot(table: &mut FieldTable<ItemSlots>, slot: ItemSlot) {
    // each slot is its own pair of fields, so a pickup only sends one slot
    match slot {
        ItemSlot::Secondary => table
            .register(
                "secondary_item",
                |slots| FieldValue::Int(slots.items[0] as i64),
                |slots, value| slots.items[0] = value.as_int() as ItemIndex,
            )
            .register(
                "secondary_cooldown",
                |slots| FieldValue::Int(slots.equip_cooldowns[0].to_raw()),
                |slots, value| slots.equip_cooldowns[0] = TickTimer::from_raw(value.as_int()),
            ),
        ItemSlot::Tertiary => table
            .register(
                "tertiary_item",
                |slots| FieldValue::Int(slots.items[1] as i64),
                |slots, value| slots.items[1] = value.as_int() as ItemIndex,
            )
            .register(
                "tertiary_cooldown",
                |slots| FieldValue::Int(slots.equip_cooldowns[1].to_raw()),
                |slots, value| slots.equip_cooldowns[1] = TickTimer::from_raw(value.as_int()),
            ),
        ItemSlot::Quaternary => table
            .register(
                "quaternary_item",
                |slots| FieldValue::Int(slots.items[2] as i64),
                |slots, value| slots.items[2] = value.as_int() as ItemIndex,
            )
            .register(
                "quaternary_cooldown",
                |slots| FieldValue::Int(slots.equip_cooldowns[2].to_raw()),
                |slots, value| slots.equip_cooldowns[2] = TickTimer::from_raw(value.as_int()),
            ),
    };
}

impl Synchronized for ItemSlots {
    fn register_fields(table: &mut FieldTable<Self>) {
        for slot in ItemSlot::PRIORITY {
            register_slot(table, slot);
        }
        table.register(
            "current_slot",
            |slots| FieldValue::Int(slots.current_slot.number() as i64),
            |slots, value| slots.current_slot = ItemSlot::from_number(value.as_int() as i32),
        );
    }
}
