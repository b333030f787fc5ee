use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::player::lap_info::LapNumber;
use crate::player::RacerID;

// Match-wide notifications the authority broadcasts to every participant,
// itself included
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum RaceEvent {
    LapCompleted {
        racer: RacerID,
        lap: LapNumber,
        is_finish: bool,
    },
    TimeWarning {
        remaining_secs: f64,
    },
    TimeUp,
    ReturnToLobby,
    LapIncreased {
        added_laps: LapNumber,
        new_max: LapNumber,
    },
    LapIncreaseFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    LapCompleted,
    TimeWarning,
    TimeUp,
    ReturnToLobby,
    LapIncreased,
    LapIncreaseFailed,
}

impl RaceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RaceEvent::LapCompleted { .. } => EventKind::LapCompleted,
            RaceEvent::TimeWarning { .. } => EventKind::TimeWarning,
            RaceEvent::TimeUp => EventKind::TimeUp,
            RaceEvent::ReturnToLobby => EventKind::ReturnToLobby,
            RaceEvent::LapIncreased { .. } => EventKind::LapIncreased,
            RaceEvent::LapIncreaseFailed => EventKind::LapIncreaseFailed,
        }
    }
}

pub type Listener = Box<dyn FnMut(&RaceEvent)>;

// Typed observer list. Listeners run in subscription order.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) {
        self.listeners
            .entry(kind)
            .or_insert_with(Vec::new)
            .push(listener);
    }

    pub fn publish(&mut self, event: &RaceEvent) {
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_only_matching_listeners_run() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let warnings = Rc::clone(&seen);
        bus.subscribe(
            EventKind::TimeWarning,
            Box::new(move |event| warnings.borrow_mut().push(event.clone())),
        );

        bus.publish(&RaceEvent::TimeUp);
        bus.publish(&RaceEvent::TimeWarning {
            remaining_secs: 12.0,
        });

        assert_eq!(
            *seen.borrow(),
            vec![RaceEvent::TimeWarning {
                remaining_secs: 12.0
            }]
        );
    }

    #[test]
    fn test_listeners_in_subscription_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        for id in 0..3 {
            let order = Rc::clone(&order);
            bus.subscribe(
                EventKind::TimeUp,
                Box::new(move |_| order.borrow_mut().push(id)),
            );
        }
        bus.publish(&RaceEvent::TimeUp);

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }
}
