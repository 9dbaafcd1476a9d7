//! Loopstage Core - beat-synchronized soundboard engine and character library

pub mod audio;
pub mod clip;
pub mod config;
pub mod db;
pub mod engine;
pub mod library;
pub mod soundboard;
pub mod stage;
pub mod types;

pub use soundboard::Soundboard;
pub use types::*;
