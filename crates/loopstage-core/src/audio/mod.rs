//! Audio output
//!
//! Opens a cpal output stream and hands it the `LoopMixer`. Control code
//! only ever talks to the mixer through the command queue.

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use cpal_backend::{start_output, OutputHandle};
pub use device::output_devices;
pub use error::{AudioError, AudioResult};
