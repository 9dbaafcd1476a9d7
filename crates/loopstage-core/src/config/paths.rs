//! Default locations for the database, markers and config file

use std::path::PathBuf;

/// Config file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// `<platform data dir>/loopstage`, or `./loopstage` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loopstage")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join(CONFIG_FILE_NAME)
}
