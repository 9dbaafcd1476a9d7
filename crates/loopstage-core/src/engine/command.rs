//! Lock-free command queue from the control flow to the audio thread
//!
//! The synchronization engine decides *when* a loop starts; the mixer on the
//! audio thread only needs to know which clip to render from which frame.
//! Commands cross threads over an `rtrb` SPSC ring buffer so neither side
//! ever blocks.

use basedrop::Shared;

use crate::clip::AudioClip;

/// Identifies one scheduled loop on the audio thread
///
/// Keys are never reused, so a stale `Stop` cannot hit a newer voice.
pub type VoiceKey = u64;

/// Commands sent from the control flow to the mixer
pub enum LoopCommand {
    /// Start looping `clip` at absolute frame `start_frame`
    Start {
        key: VoiceKey,
        clip: Shared<AudioClip>,
        start_frame: u64,
    },
    /// Remove one voice, whether or not it has started sounding
    Stop { key: VoiceKey },
    /// Remove every voice
    StopAll,
    /// Master output gain
    SetVolume(f32),
}

pub const COMMAND_QUEUE_CAPACITY: usize = 256;

pub fn command_channel() -> (CommandSender, rtrb::Consumer<LoopCommand>) {
    let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    (CommandSender { producer }, consumer)
}

/// Producer side of the command queue, owned by the control flow
pub struct CommandSender {
    producer: rtrb::Producer<LoopCommand>,
}

impl CommandSender {
    /// Queue a command (non-blocking)
    ///
    /// Returns the command back if the queue is full.
    pub fn send(&mut self, cmd: LoopCommand) -> Result<(), LoopCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }

    /// Free slots; only grows until the next `send`
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}
