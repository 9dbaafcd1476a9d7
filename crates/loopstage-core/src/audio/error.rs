//! Errors from opening and starting the output stream

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    /// The default host has no output device (carries the host name)
    #[error("No default output device on host {0}")]
    NoDefaultDevice(String),

    #[error("Output device not found: {0}")]
    DeviceNotFound(String),

    /// Enumerating devices or their configs failed, or nothing usable was offered
    #[error("Output device configuration: {0}")]
    ConfigError(String),

    #[error("Failed to build output stream: {0}")]
    StreamBuildError(#[from] cpal::BuildStreamError),

    #[error("Failed to start output stream: {0}")]
    StreamPlayError(#[from] cpal::PlayStreamError),
}

pub type AudioResult<T> = Result<T, AudioError>;
