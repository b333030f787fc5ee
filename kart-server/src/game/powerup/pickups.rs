use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kart_core::tick::{Tick, TickTimer};

use super::PowerUp;
use crate::checkpoints::{TriggerContext, TriggerEntity, TriggerOutcome};
use crate::game::racer::RacerEntity;

// Seeded from the tick and the racer, so a replayed match hands out the same
// items in the same order
fn draw_powerup(tick: Tick, racer: usize) -> PowerUp {
    let mut rng = StdRng::seed_from_u64(((tick as u64) << 16) ^ racer as u64);
    PowerUp::ALL[rng.gen_range(0..PowerUp::ALL.len())]
}

#[derive(Clone, Copy, Debug)]
pub struct ItemBox {
    pub disabled: TickTimer,
    cooldown_secs: f64,
    equip_timeout_secs: f64,
}

impl ItemBox {
    pub fn new(cooldown_secs: f64, equip_timeout_secs: f64) -> Self {
        Self {
            disabled: TickTimer::NONE,
            cooldown_secs,
            equip_timeout_secs,
        }
    }

    pub fn is_active(&self, now: Tick) -> bool {
        self.disabled.expired_or_not_running(now)
    }
}

impl TriggerEntity for ItemBox {
    fn trigger(&mut self, racer: &mut RacerEntity, context: &TriggerContext) -> TriggerOutcome {
        // a box only gives out one item per cooldown
        if !self.is_active(context.tick) {
            return TriggerOutcome::Ignored;
        }
        self.disabled = TickTimer::from_seconds(context.clock, context.tick, self.cooldown_secs);

        let powerup = draw_powerup(context.tick, racer.id);
        let slot = racer.items.pickup_slot();
        let cooldown = TickTimer::from_seconds(context.clock, context.tick, self.equip_timeout_secs);
        racer
            .items
            .equip(context.authority, slot, powerup.index(), cooldown);
        debug!("racer {} picked up {:?} into slot {:?}", racer.id, powerup, slot);

        TriggerOutcome::ItemGranted {
            slot,
            item: powerup.index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_core::authority::Role;
    use kart_core::game_type::{GameType, ModeKind};
    use kart_core::player::items::{ItemSlot, EMPTY_ITEM};
    use kart_core::player::lap_info::LapRules;
    use kart_core::tick::TickClock;
    use kart_core::track::Track;

    #[test]
    fn test_item_box_fills_slots_in_order_then_cools_down() {
        let authority = Role::Authority.authority().unwrap();
        let clock = TickClock::new(60);
        let rules = LapRules::new(&GameType::default(), 3, &Track::builtin_oval());
        let mut racer = RacerEntity::new(0, ModeKind::LapRace);
        let mut item_box = ItemBox::new(5.0, 3.0);

        let context = |tick| TriggerContext {
            authority: &authority,
            clock: &clock,
            tick,
            rules,
            is_debug_force: false,
        };

        let first = item_box.trigger(&mut racer, &context(10));
        assert!(matches!(
            first,
            TriggerOutcome::ItemGranted {
                slot: ItemSlot::Secondary,
                ..
            }
        ));
        // still disabled a tick before the five seconds are up
        assert_eq!(item_box.trigger(&mut racer, &context(309)), TriggerOutcome::Ignored);
        assert_eq!(racer.items.item(ItemSlot::Tertiary), EMPTY_ITEM);

        let second = item_box.trigger(&mut racer, &context(310));
        assert!(matches!(
            second,
            TriggerOutcome::ItemGranted {
                slot: ItemSlot::Tertiary,
                ..
            }
        ));
        // freshly picked up items wait out the equip timeout
        assert!(!racer.items.can_use(ItemSlot::Tertiary, 310));
        assert!(racer.items.can_use(ItemSlot::Tertiary, 490));
    }

    #[test]
    fn test_draw_is_deterministic() {
        assert_eq!(draw_powerup(1234, 1), draw_powerup(1234, 1));
    }
}
