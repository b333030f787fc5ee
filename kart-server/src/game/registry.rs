use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use kart_core::player::RacerID;

use super::racer::RacerEntity;

pub type SharedRacer = Arc<Mutex<RacerEntity>>;

// a panic while a racer was locked leaves plain data behind, keep using it
pub fn lock_racer(racer: &SharedRacer) -> MutexGuard<'_, RacerEntity> {
    racer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The live racer entities of one server. Cloning shares the same set.
///
/// Only spawn and despawn change membership. Match-wide effects iterate a
/// `snapshot`, so a racer removed mid-iteration is simply operated on one
/// last time instead of invalidating the loop.
#[derive(Clone, Default)]
pub struct RacerRegistry {
    racers: Arc<Mutex<BTreeMap<RacerID, SharedRacer>>>,
}

impl RacerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn racers(&self) -> MutexGuard<'_, BTreeMap<RacerID, SharedRacer>> {
        self.racers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spawn(&self, racer: RacerEntity) -> SharedRacer {
        let id = racer.id;
        let shared = Arc::new(Mutex::new(racer));
        if self.racers().insert(id, Arc::clone(&shared)).is_some() {
            warn!("racer {} spawned twice, replacing the old entity", id);
        } else {
            info!("racer {} spawned", id);
        }
        shared
    }

    pub fn despawn(&self, id: RacerID) -> Option<SharedRacer> {
        let removed = self.racers().remove(&id);
        if removed.is_some() {
            info!("racer {} despawned", id);
        }
        removed
    }

    pub fn get(&self, id: RacerID) -> Option<SharedRacer> {
        self.racers().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.racers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.racers().is_empty()
    }

    pub fn ids(&self) -> Vec<RacerID> {
        self.racers().keys().copied().collect()
    }

    // copies the membership out so nothing holds the registry lock while iterating
    pub fn snapshot(&self) -> Vec<(RacerID, SharedRacer)> {
        self.racers()
            .iter()
            .map(|(id, racer)| (*id, Arc::clone(racer)))
            .collect()
    }

    pub fn clear(&self) -> Vec<RacerID> {
        let mut racers = self.racers();
        let ids = racers.keys().copied().collect();
        racers.clear();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_core::game_type::ModeKind;

    #[test]
    fn test_despawn_during_snapshot_iteration() {
        let registry = RacerRegistry::new();
        for id in 0..3 {
            registry.spawn(RacerEntity::new(id, ModeKind::LapRace));
        }

        let mut visited = Vec::new();
        for (id, racer) in registry.snapshot() {
            // another racer leaves while the effect is being applied
            registry.despawn(2);
            lock_racer(&racer).input_enabled = true;
            visited.push(id);
        }

        assert_eq!(visited, vec![0, 1, 2]);
        assert_eq!(registry.ids(), vec![0, 1]);
    }

    #[test]
    fn test_clones_share_membership() {
        let registry = RacerRegistry::new();
        let handle = registry.clone();
        handle.spawn(RacerEntity::new(4, ModeKind::LapRace));

        assert_eq!(registry.ids(), vec![4]);
        assert_eq!(registry.clear(), vec![4]);
        assert!(handle.is_empty());
    }
}
