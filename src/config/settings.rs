//! Application settings

use crate::core::target::AliasTable;
use crate::core::tnc::ArqBandwidth;
use crate::core::transport::TransportKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration load/save error
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or schema error
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization error
    #[error("Unable to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Operator's own call sign
    pub mycall: String,
    /// Maidenhead locator
    pub locator: String,
    /// Dial even if the channel is busy
    pub ignore_busy: bool,
    /// Short names for connection strings
    pub connect_aliases: AliasTable,
    /// ARDOP TNC settings
    pub ardop: ArdopConfig,
    /// WINMOR TNC settings
    pub winmor: WinmorConfig,
    /// AX.25 settings
    pub ax25: Ax25Config,
    /// Serial packet TNC settings
    pub serial_tnc: SerialTncConfig,
    /// Telnet settings
    pub telnet: TelnetConfig,
    /// Delays and timeouts
    pub timing: TimingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mycall: String::new(),
            locator: String::new(),
            ignore_busy: false,
            connect_aliases: AliasTable::new(),
            ardop: ArdopConfig::default(),
            winmor: WinmorConfig::default(),
            ax25: Ax25Config::default(),
            serial_tnc: SerialTncConfig::default(),
            telnet: TelnetConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the default location, or defaults if it does not exist
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = super::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = super::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("config.toml");
        self.save_to(&config_path)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rig reference configured for a transport scheme.
    ///
    /// `None` when the transport has no rig setting at all, `Some("")` when
    /// it has one but it is empty.
    pub fn rig_binding(&self, scheme: &str) -> Option<&str> {
        match TransportKind::from_scheme(scheme)? {
            TransportKind::Ardop => Some(self.ardop.rig.as_str()),
            TransportKind::Winmor => Some(self.winmor.rig.as_str()),
            TransportKind::Ax25 => Some(self.ax25.rig.as_str()),
            TransportKind::SerialTnc | TransportKind::Telnet => None,
        }
    }
}

/// ARDOP TNC settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArdopConfig {
    /// TNC command port address
    pub addr: String,
    /// ARQ bandwidth; left at the TNC default when unset
    pub arq_bandwidth: Option<ArqBandwidth>,
    /// Send CW identification
    pub cwid: bool,
    /// Rig used for QSY and PTT
    pub rig: String,
    /// Key the rig's PTT from the TNC
    pub ptt_control: bool,
}

impl Default for ArdopConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:8515".to_string(),
            arq_bandwidth: None,
            cwid: true,
            rig: String::new(),
            ptt_control: false,
        }
    }
}

/// WINMOR TNC settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WinmorConfig {
    /// TNC command port address
    pub addr: String,
    /// Rig used for QSY and PTT
    pub rig: String,
    /// Key the rig's PTT from the TNC
    pub ptt_control: bool,
}

impl Default for WinmorConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:8500".to_string(),
            rig: String::new(),
            ptt_control: false,
        }
    }
}

/// AX.25 settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ax25Config {
    /// axport name used when the target has no host
    pub port: String,
    /// Rig used for QSY
    pub rig: String,
}

impl Default for Ax25Config {
    fn default() -> Self {
        Self {
            port: "wl2k".to_string(),
            rig: String::new(),
        }
    }
}

/// Serial packet TNC settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialTncConfig {
    /// Device path used when the target has no host
    pub path: String,
    /// Baud rate injected as `baud`; 0 leaves it unset
    pub baudrate: u32,
}

impl Default for SerialTncConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
        }
    }
}

/// Telnet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelnetConfig {
    /// Login password when the target URL carries none
    pub password: String,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            password: "CMSTelnet".to_string(),
        }
    }
}

/// Delays and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Busy-channel poll interval
    pub busy_poll_ms: u64,
    /// Give up waiting for a clear channel after this long; unset waits forever
    pub busy_timeout_secs: Option<u64>,
    /// Settling delay after a QSY, before dialing
    pub qsy_settle_ms: u64,
    /// Settling delay before restoring the prior frequency
    pub revert_settle_ms: u64,
    /// Dial timeout
    pub dial_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            busy_poll_ms: 300,
            busy_timeout_secs: None,
            qsy_settle_ms: 3000,
            revert_settle_ms: 1000,
            dial_timeout_secs: 120,
        }
    }
}

impl TimingConfig {
    /// Busy-channel poll interval
    pub fn busy_poll(&self) -> Duration {
        Duration::from_millis(self.busy_poll_ms)
    }

    /// Maximum busy wait
    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_secs.map(Duration::from_secs)
    }

    /// Post-QSY settling delay
    pub fn qsy_settle(&self) -> Duration {
        Duration::from_millis(self.qsy_settle_ms)
    }

    /// Pre-revert settling delay
    pub fn revert_settle(&self) -> Duration {
        Duration::from_millis(self.revert_settle_ms)
    }

    /// Dial timeout
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}
