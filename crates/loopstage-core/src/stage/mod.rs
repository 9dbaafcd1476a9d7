//! The stage: seven slots driving the synchronization engine
//!
//! Putting a character in a slot starts its loop on the shared bar grid;
//! clearing the slot stops it. The stage also tracks which phase is shown
//! and publishes `StageEvent`s for hosts.

mod events;

pub use events::{EventBus, StageEvent};

use crossbeam::channel::Receiver;

use crate::clip::ClipStore;
use crate::engine::{AudioClock, SyncEngine};
use crate::library::Phase;
use crate::types::NUM_SLOTS;

/// Stage errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StageError {
    #[error("Invalid slot index: {0}")]
    InvalidSlot(usize),

    #[error("Unknown character: {0}")]
    UnknownCharacter(String),
}

pub struct Stage<C: AudioClock> {
    slots: [Option<String>; NUM_SLOTS],
    phase: Phase,
    engine: SyncEngine<C>,
    events: EventBus,
}

impl<C: AudioClock> Stage<C> {
    pub fn new(engine: SyncEngine<C>) -> Self {
        Self {
            slots: Default::default(),
            phase: Phase::default(),
            engine,
            events: EventBus::new(),
        }
    }

    pub fn engine(&self) -> &SyncEngine<C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine<C> {
        &mut self.engine
    }

    pub fn subscribe(&mut self) -> Receiver<StageEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&mut self, event: StageEvent) {
        self.events.publish(event);
    }

    pub fn slots(&self) -> &[Option<String>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|s| s.as_deref())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether any slot holds `id`
    pub fn is_assigned(&self, id: &str) -> bool {
        self.slots.iter().any(|s| s.as_deref() == Some(id))
    }

    fn check_slot(index: usize) -> Result<(), StageError> {
        if index < NUM_SLOTS {
            Ok(())
        } else {
            Err(StageError::InvalidSlot(index))
        }
    }

    /// Put `id` in `slot` and start its loop on the next bar
    ///
    /// An occupied slot is vacated first. Returns the scheduled start time,
    /// or `None` when `id` has no loaded clip (the slot is still filled).
    pub fn assign(
        &mut self,
        slot: usize,
        id: &str,
        clips: &ClipStore,
    ) -> Result<Option<f64>, StageError> {
        Self::check_slot(slot)?;

        if self.slots[slot].is_some() {
            self.remove(slot)?;
        }

        self.slots[slot] = Some(id.to_string());
        let start_time = self.engine.start_loop(id, clips);
        log::debug!("Stage::assign: slot {} <- {} ({:?})", slot, id, start_time);

        self.publish(StageEvent::SlotAssigned {
            slot,
            id: id.to_string(),
            start_time,
        });
        Ok(start_time)
    }

    /// Clear `slot`, returning the id it held
    ///
    /// The loop keeps playing while another slot still holds the same id.
    pub fn remove(&mut self, slot: usize) -> Result<Option<String>, StageError> {
        Self::check_slot(slot)?;

        let Some(id) = self.slots[slot].take() else {
            return Ok(None);
        };

        if !self.is_assigned(&id) {
            self.engine.stop_loop(&id);
        }
        log::debug!("Stage::remove: slot {} cleared ({})", slot, id);

        self.publish(StageEvent::SlotCleared {
            slot,
            id: id.clone(),
        });
        Ok(Some(id))
    }

    /// Stop every loop and clear every slot
    pub fn stop_all(&mut self) {
        self.engine.stop_all();
        self.slots = Default::default();
        self.publish(StageEvent::AllStopped);
    }

    /// Switch phase; the stage is emptied because the character sets differ
    pub fn set_phase(&mut self, phase: Phase) {
        self.stop_all();
        if self.phase != phase {
            self.phase = phase;
            log::info!("Stage::set_phase: now showing phase {}", phase);
        }
        self.publish(StageEvent::PhaseChanged(phase));
    }

    pub fn toggle_phase(&mut self) -> Phase {
        let next = self.phase.toggled();
        self.set_phase(next);
        next
    }

    /// Stop `id`'s loop without touching the slots
    pub(crate) fn silence(&mut self, id: &str) {
        self.engine.stop_loop(id);
    }

    /// Start `id` again on the next bar if it is on stage
    pub(crate) fn resume(&mut self, id: &str, clips: &ClipStore) -> Option<f64> {
        if self.is_assigned(id) {
            self.engine.start_loop(id, clips)
        } else {
            None
        }
    }
}
