//! Configuration module
//!
//! Handles station settings, per-transport sections and connect aliases

mod settings;

pub use settings::{
    AppConfig, ArdopConfig, Ax25Config, ConfigError, SerialTncConfig, TelnetConfig,
    TimingConfig, WinmorConfig,
};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "hamlink", "Hamlink").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "hamlink", "Hamlink").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Default location of the connection event log
pub fn event_log_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("eventlog.json"))
}

/// Initialize application directories
pub fn init_directories() -> std::io::Result<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    if let Some(dir) = data_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}
