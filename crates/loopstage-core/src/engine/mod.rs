//! Loop scheduling and real-time mixing
//!
//! The control side (`SyncEngine`) decides when each loop starts; the audio
//! side (`LoopMixer`) renders them. The two talk through a lock-free command
//! queue and share time through the mixer's frame counter.

mod clock;
mod command;
mod gc;
mod mixer;
mod sync;

pub use clock::{AudioClock, ManualClock, SampleClock};
pub use command::{command_channel, CommandSender, LoopCommand, VoiceKey, COMMAND_QUEUE_CAPACITY};
pub use gc::gc_handle;
pub use mixer::{LoopMixer, MAX_VOICES};
pub use sync::{PlaybackHandle, SyncEngine, SyncState};
