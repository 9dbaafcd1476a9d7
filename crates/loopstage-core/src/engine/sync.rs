//! Bar-grid synchronization of independently started loops
//!
//! One engine owns one grid. The first loop of a session fixes the anchor
//! (bar 0) slightly in the future; every later loop joins at the next bar
//! boundary after "now". When the last loop stops the anchor is dropped and
//! the next start defines a fresh grid.
//!
//! ```text
//!   anchor        +period       +2·period      +3·period
//!     │─────────────│─────────────│─────────────│
//!     x starts      y starts      z starts
//!                 ▲ y requested here
//! ```

use std::collections::HashMap;

use crate::clip::ClipStore;
use crate::types::{DEFAULT_LOOP_PERIOD, DEFAULT_SAFETY_MARGIN};

use super::clock::AudioClock;
use super::command::{CommandSender, LoopCommand, VoiceKey};

/// One character's scheduled or sounding loop
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackHandle {
    pub character_id: String,
    /// Absolute start time on the shared clock
    pub start_time: f64,
    pub looping: bool,
    pub(crate) key: VoiceKey,
}

/// The grid state, owned by exactly one `SyncEngine`
#[derive(Debug, Clone)]
pub struct SyncState {
    anchor_time: Option<f64>,
    loop_period: f64,
    is_playing: bool,
    handles: HashMap<String, PlaybackHandle>,
}

impl SyncState {
    fn new(loop_period: f64) -> Self {
        Self {
            anchor_time: None,
            loop_period,
            is_playing: false,
            handles: HashMap::new(),
        }
    }

    /// Start of bar 0 for the current session, `None` while idle
    pub fn anchor_time(&self) -> Option<f64> {
        self.anchor_time
    }

    pub fn loop_period(&self) -> f64 {
        self.loop_period
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn handle(&self, id: &str) -> Option<&PlaybackHandle> {
        self.handles.get(id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &PlaybackHandle> {
        self.handles.values()
    }

    pub fn active_count(&self) -> usize {
        self.handles.len()
    }

    /// Where a loop requested at `now` would start: `(start_time, anchor)`
    ///
    /// Idle: the new anchor is `now + margin` and the loop starts on it.
    /// Running: the first bar boundary strictly after the current bar.
    fn next_start(&self, now: f64, safety_margin: f64) -> (f64, f64) {
        match self.anchor_time {
            None => {
                let anchor = now + safety_margin;
                (anchor, anchor)
            }
            Some(anchor) => {
                let elapsed = now - anchor;
                let current_bar = (elapsed / self.loop_period).floor();
                (anchor + (current_bar + 1.0) * self.loop_period, anchor)
            }
        }
    }

    fn reset(&mut self) {
        self.anchor_time = None;
        self.is_playing = false;
        self.handles.clear();
    }
}

/// Schedules loops on the shared bar grid and forwards them to the mixer
pub struct SyncEngine<C: AudioClock> {
    clock: C,
    state: SyncState,
    safety_margin: f64,
    commands: CommandSender,
    next_key: VoiceKey,
}

impl<C: AudioClock> SyncEngine<C> {
    /// Engine with the default one-bar period and safety margin
    pub fn new(clock: C, commands: CommandSender) -> Self {
        Self::with_timing(clock, commands, DEFAULT_LOOP_PERIOD, DEFAULT_SAFETY_MARGIN)
    }

    pub fn with_timing(
        clock: C,
        commands: CommandSender,
        loop_period: f64,
        safety_margin: f64,
    ) -> Self {
        debug_assert!(loop_period > 0.0, "loop period must be positive");
        Self {
            clock,
            state: SyncState::new(loop_period),
            safety_margin,
            commands,
            next_key: 0,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state.handles.contains_key(id)
    }

    /// Start `id`'s clip on the grid, returning the scheduled start time
    ///
    /// Returns `None` (and changes nothing) when the clip is not loaded or
    /// the mixer queue cannot take every command the start needs. An already
    /// active `id` is stopped first and rescheduled from scratch.
    pub fn start_loop(&mut self, id: &str, clips: &ClipStore) -> Option<f64> {
        let Some(clip) = clips.get(id) else {
            log::debug!("start_loop: no clip loaded for {}, ignoring", id);
            return None;
        };
        let clip = clip.clone();

        // Restart needs Stop + Start
        let needed = if self.is_active(id) { 2 } else { 1 };
        if self.commands.slots() < needed {
            log::error!("start_loop: command queue full, dropping start of {}", id);
            return None;
        }

        self.stop_loop(id);

        let now = self.clock.now();
        let (start_time, anchor) = self.state.next_start(now, self.safety_margin);
        let start_frame = (start_time * self.clock.sample_rate() as f64).round().max(0.0) as u64;

        let key = self.next_key;
        if self
            .commands
            .send(LoopCommand::Start {
                key,
                clip,
                start_frame,
            })
            .is_err()
        {
            log::error!("start_loop: command queue full, dropping start of {}", id);
            return None;
        }
        self.next_key += 1;

        self.state.anchor_time = Some(anchor);
        self.state.is_playing = true;
        self.state.handles.insert(
            id.to_string(),
            PlaybackHandle {
                character_id: id.to_string(),
                start_time,
                looping: true,
                key,
            },
        );

        log::debug!(
            "start_loop: scheduled {} at {:.3} (now {:.3})",
            id,
            start_time,
            now
        );
        Some(start_time)
    }

    /// Stop `id`'s loop, including one that has not started sounding yet
    ///
    /// Stopping an id without a handle is a no-op. Stopping the last handle
    /// returns the engine to idle and forgets the anchor. If the mixer queue
    /// is full the handle stays, so a later stop can still reach the voice.
    pub fn stop_loop(&mut self, id: &str) {
        if let Some(key) = self.state.handles.get(id).map(|h| h.key) {
            if self.commands.send(LoopCommand::Stop { key }).is_err() {
                log::error!("stop_loop: command queue full, keeping {} active", id);
                return;
            }
            self.state.handles.remove(id);
            log::debug!("stop_loop: stopped {}", id);
        }

        if self.state.handles.is_empty() {
            self.state.reset();
        }
    }

    /// Stop every loop and return to idle
    ///
    /// With a full mixer queue nothing changes.
    pub fn stop_all(&mut self) {
        if self.commands.send(LoopCommand::StopAll).is_err() {
            log::error!("stop_all: command queue full, keeping {} loops", self.state.handles.len());
            return;
        }
        self.state.reset();
        log::debug!("stop_all: engine idle");
    }

    /// Forward a master volume change to the mixer
    pub fn set_volume(&mut self, volume: f32) {
        if self.commands.send(LoopCommand::SetVolume(volume)).is_err() {
            log::warn!("set_volume: command queue full");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{placeholder_tone, ClipSource};
    use crate::engine::{command_channel, ManualClock};

    const EPS: f64 = 1e-9;

    fn engine_with(ids: &[&str]) -> (SyncEngine<ManualClock>, ManualClock, ClipStore, rtrb::Consumer<LoopCommand>) {
        let clock = ManualClock::new(48000);
        let (tx, rx) = command_channel();
        let engine = SyncEngine::new(clock.clone(), tx);
        let mut clips = ClipStore::new(".", 48000);
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        for id in ids {
            // Garbage data decodes to the placeholder, which is all these tests need
            rt.block_on(clips.load(id, ClipSource::Data(vec![0; 16])));
        }
        (engine, clock, clips, rx)
    }

    #[test]
    fn test_first_start_anchors_with_margin() {
        let (mut engine, _clock, clips, _rx) = engine_with(&["x"]);
        let start = engine.start_loop("x", &clips).unwrap();
        assert!((start - 0.1).abs() < EPS);
        assert_eq!(engine.state().anchor_time(), Some(start));
        assert!(engine.state().is_playing());
    }

    #[test]
    fn test_join_waits_for_next_bar() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x", "y"]);
        engine.start_loop("x", &clips);

        clock.set(1.0);
        let start = engine.start_loop("y", &clips).unwrap();
        assert!((start - 2.1).abs() < EPS);
    }

    #[test]
    fn test_join_exactly_on_boundary_goes_to_following_bar() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x", "y"]);
        engine.start_loop("x", &clips);

        clock.set(2.1);
        let start = engine.start_loop("y", &clips).unwrap();
        assert!((start - 4.1).abs() < EPS);
    }

    #[test]
    fn test_join_before_anchor_lands_on_anchor() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x", "y"]);
        engine.start_loop("x", &clips);

        clock.set(0.05);
        let start = engine.start_loop("y", &clips).unwrap();
        assert!((start - 0.1).abs() < EPS);
    }

    #[test]
    fn test_restart_keeps_single_handle() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x", "y"]);
        engine.start_loop("x", &clips);
        engine.start_loop("y", &clips);

        clock.set(3.0);
        let start = engine.start_loop("y", &clips).unwrap();

        assert_eq!(engine.state().active_count(), 2);
        let handle = engine.state().handle("y").unwrap();
        assert!((handle.start_time - 4.1).abs() < EPS);
        assert_eq!(handle.start_time, start);
    }

    #[test]
    fn test_restart_of_only_loop_reanchors() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x"]);
        engine.start_loop("x", &clips);

        clock.set(5.0);
        let start = engine.start_loop("x", &clips).unwrap();
        assert!((start - 5.1).abs() < EPS);
        assert_eq!(engine.state().active_count(), 1);
    }

    #[test]
    fn test_starts_stay_on_grid_while_running() {
        let ids = ["a", "b", "c", "d", "e"];
        let (mut engine, clock, clips, _rx) = engine_with(&ids);
        engine.start_loop("a", &clips);
        let anchor = engine.state().anchor_time().unwrap();

        for (i, id) in ids.iter().enumerate().skip(1) {
            clock.set(0.37 + i as f64 * 1.73);
            let start = engine.start_loop(id, &clips).unwrap();
            let bars = (start - anchor) / engine.state().loop_period();
            assert!((bars - bars.round()).abs() < 1e-9, "{} off grid at {}", id, start);
            assert!(start > clock.now());
        }
        assert_eq!(engine.state().anchor_time(), Some(anchor));
    }

    #[test]
    fn test_stopping_last_loop_returns_to_idle() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x", "y", "z"]);
        engine.start_loop("x", &clips);
        clock.set(1.0);
        engine.start_loop("y", &clips);

        engine.stop_loop("x");
        assert!(engine.state().is_playing());
        engine.stop_loop("y");
        assert!(!engine.state().is_playing());
        assert_eq!(engine.state().anchor_time(), None);

        clock.set(7.3);
        let start = engine.start_loop("z", &clips).unwrap();
        assert!((start - 7.4).abs() < EPS);
    }

    #[test]
    fn test_stop_all_reanchors_next_session() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x", "y"]);
        engine.start_loop("x", &clips);
        engine.start_loop("y", &clips);
        engine.stop_all();

        assert_eq!(engine.state().active_count(), 0);
        assert_eq!(engine.state().anchor_time(), None);

        clock.set(3.33);
        let start = engine.start_loop("y", &clips).unwrap();
        assert!((start - 3.43).abs() < EPS);
    }

    #[test]
    fn test_start_without_clip_is_ignored() {
        let (mut engine, _clock, clips, mut rx) = engine_with(&[]);
        assert_eq!(engine.start_loop("ghost", &clips), None);
        assert!(!engine.state().is_playing());
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_stop_unknown_is_noop() {
        let (mut engine, _clock, _clips, mut rx) = engine_with(&[]);
        engine.stop_loop("ghost");
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_commands_carry_frame_and_unique_keys() {
        let (mut engine, clock, clips, mut rx) = engine_with(&["x"]);
        engine.start_loop("x", &clips);
        clock.set(0.5);
        engine.start_loop("x", &clips);

        let mut keys = Vec::new();
        while let Ok(cmd) = rx.pop() {
            match cmd {
                LoopCommand::Start { key, start_frame, .. } => {
                    keys.push(key);
                    assert!(start_frame == 4800 || start_frame == 28800);
                }
                LoopCommand::Stop { key } => assert_eq!(key, keys[0]),
                _ => panic!("unexpected command"),
            }
        }
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn test_full_queue_leaves_state_untouched() {
        let clock = ManualClock::new(48000);
        let (tx, _rx) = command_channel();
        let mut engine = SyncEngine::new(clock, tx);
        let mut clips = ClipStore::new(".", 48000);
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(clips.load("x", ClipSource::Data(vec![0; 16])));

        for _ in 0..crate::engine::COMMAND_QUEUE_CAPACITY {
            engine.set_volume(1.0);
        }
        assert_eq!(engine.start_loop("x", &clips), None);
        assert!(!engine.state().is_playing());
        assert_eq!(engine.state().anchor_time(), None);
        // The placeholder itself is still cached
        assert_eq!(clips.get("x").unwrap().len(), placeholder_tone("x", 48000).len());
    }

    /// Queue up `set_volume` commands until only `left` slots remain
    fn fill_queue(engine: &mut SyncEngine<ManualClock>, left: usize) {
        while engine.commands.slots() > left {
            engine.set_volume(1.0);
        }
    }

    #[test]
    fn test_stop_with_full_queue_keeps_handle() {
        let (mut engine, _clock, clips, mut rx) = engine_with(&["x"]);
        let start = engine.start_loop("x", &clips).unwrap();
        fill_queue(&mut engine, 0);

        engine.stop_loop("x");
        assert!(engine.is_active("x"));
        assert!(engine.state().is_playing());
        assert_eq!(engine.state().anchor_time(), Some(start));

        engine.stop_all();
        assert!(engine.is_active("x"));
        assert!(engine.state().is_playing());

        // Once the mixer drains a command the stop goes through
        rx.pop().unwrap();
        engine.stop_loop("x");
        assert!(!engine.is_active("x"));
        assert!(!engine.state().is_playing());
        assert_eq!(engine.state().anchor_time(), None);
    }

    #[test]
    fn test_restart_with_one_free_slot_keeps_old_loop() {
        let (mut engine, clock, clips, _rx) = engine_with(&["x"]);
        let start = engine.start_loop("x", &clips).unwrap();
        clock.set(1.0);
        fill_queue(&mut engine, 1);

        assert_eq!(engine.start_loop("x", &clips), None);
        assert!(engine.is_active("x"));
        assert_eq!(engine.state().anchor_time(), Some(start));
        assert_eq!(engine.state().handle("x").unwrap().start_time, start);
    }
}
