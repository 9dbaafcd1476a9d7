//! Soundboard configuration
//!
//! One YAML file describes where data lives, which default characters to
//! seed, the bar grid timing, and the audio output. Every field has a
//! default, so a partial file (or none at all) is fine.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_data_dir, CONFIG_FILE_NAME};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::library::SeedSource;
use crate::types::{DEFAULT_LOOP_PERIOD, DEFAULT_SAFETY_MARGIN};

/// Marker file in `data_dir` holding the fingerprint of the last seed set
pub const SEED_MARKER_FILE: &str = "seed.fingerprint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundboardConfig {
    /// Database and marker files
    pub data_dir: PathBuf,

    /// Base directory for asset path references
    pub asset_root: PathBuf,

    /// YAML asset manifest (`None` = built-in library)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,

    pub seed_source: SeedSource,

    /// Bar length in seconds
    pub loop_period: f64,

    /// Lead time before the first loop of an idle engine, in seconds
    pub safety_margin: f64,

    pub audio: AudioConfig,
}

impl Default for SoundboardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            asset_root: PathBuf::from("."),
            manifest_path: None,
            seed_source: SeedSource::default(),
            loop_period: DEFAULT_LOOP_PERIOD,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            audio: AudioConfig::default(),
        }
    }
}

impl SoundboardConfig {
    pub fn seed_marker_path(&self) -> PathBuf {
        self.data_dir.join(SEED_MARKER_FILE)
    }

    /// Clamp timing values into a usable range
    pub fn sanitized(mut self) -> Self {
        if !(self.loop_period > 0.0) {
            log::warn!(
                "SoundboardConfig: loop_period {} is not positive, using {}",
                self.loop_period,
                DEFAULT_LOOP_PERIOD
            );
            self.loop_period = DEFAULT_LOOP_PERIOD;
        }
        if !(self.safety_margin >= 0.0) {
            log::warn!(
                "SoundboardConfig: safety_margin {} is negative, using {}",
                self.safety_margin,
                DEFAULT_SAFETY_MARGIN
            );
            self.safety_margin = DEFAULT_SAFETY_MARGIN;
        }
        self.audio.master_volume = self.audio.master_volume.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SoundboardConfig::default();
        assert_eq!(config.loop_period, 2.0);
        assert_eq!(config.safety_margin, 0.1);
        assert_eq!(config.seed_source, SeedSource::Manifest);
        assert!(config.manifest_path.is_none());
        assert!(config.seed_marker_path().ends_with(SEED_MARKER_FILE));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "seed_source: builtin\nloop_period: 4.0\naudio:\n  master_volume: 0.5\n";
        let config: SoundboardConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.seed_source, SeedSource::Builtin);
        assert_eq!(config.loop_period, 4.0);
        assert_eq!(config.safety_margin, 0.1);
        assert_eq!(config.audio.master_volume, 0.5);
        assert_eq!(config.asset_root, PathBuf::from("."));
    }

    #[test]
    fn test_sanitized_repairs_timing() {
        let mut config = SoundboardConfig {
            loop_period: 0.0,
            safety_margin: -1.0,
            ..Default::default()
        };
        config.audio.master_volume = 3.0;

        let config = config.sanitized();
        assert_eq!(config.loop_period, 2.0);
        assert_eq!(config.safety_margin, 0.1);
        assert_eq!(config.audio.master_volume, 1.0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = SoundboardConfig {
            data_dir: dir.path().to_path_buf(),
            manifest_path: Some(PathBuf::from("assets/manifest.yaml")),
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: SoundboardConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
