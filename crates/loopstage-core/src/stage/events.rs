//! Stage events and their fan-out to UI subscribers

use crossbeam::channel::{self, Receiver, Sender};

use crate::library::Phase;

/// Events published by the stage and the soundboard
///
/// Hosts subscribe instead of registering callbacks; a dropped receiver
/// simply stops receiving.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// A host asked to edit a character; carries what an edit form needs
    EditRequested {
        id: String,
        name: String,
        phase: Phase,
    },

    /// A character was put in a slot; `start_time` is `None` when its clip
    /// was not loaded and nothing was scheduled
    SlotAssigned {
        slot: usize,
        id: String,
        start_time: Option<f64>,
    },

    SlotCleared {
        slot: usize,
        id: String,
    },

    /// Every loop stopped and every slot cleared
    AllStopped,

    PhaseChanged(Phase),

    CharacterAdded(String),

    CharacterUpdated(String),
}

/// Broadcasts each event to every live subscriber
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<StageEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver that sees every event published from now on
    pub fn subscribe(&mut self) -> Receiver<StageEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to all subscribers, dropping those whose receiver is gone
    pub fn publish(&mut self, event: StageEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_gets_every_event() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(StageEvent::AllStopped);
        bus.publish(StageEvent::PhaseChanged(Phase::Two));

        for rx in [&a, &b] {
            assert_eq!(rx.try_recv().unwrap(), StageEvent::AllStopped);
            assert_eq!(rx.try_recv().unwrap(), StageEvent::PhaseChanged(Phase::Two));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(StageEvent::CharacterAdded("custom_1".into()));

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.len(), 1);
    }
}
