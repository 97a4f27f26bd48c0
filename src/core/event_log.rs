//! Connection event log
//!
//! Every dial attempt is recorded, successful or not, before the
//! establisher branches on the result. The file implementation writes one
//! JSON object per line.

use crate::core::rig::Frequency;
use crate::core::transport::{BoxLink, TransportError};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// One recorded connection attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAttempt {
    /// Attempt id
    pub id: Uuid,
    /// When the dial returned
    pub timestamp: DateTime<Local>,
    /// `connect <target>`
    pub what: String,
    /// Radio frequency sampled before dialing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    /// Local end of the link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_addr: Option<String>,
    /// Remote end of the link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    /// Dial error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionAttempt {
    /// Build a record from a dial result
    pub fn new(
        raw_target: &str,
        frequency: Option<Frequency>,
        result: &Result<BoxLink, TransportError>,
    ) -> Self {
        let (local_addr, remote_addr, error) = match result {
            Ok(link) => (
                Some(link.local_address()),
                Some(link.remote_address()),
                None,
            ),
            Err(e) => (None, None, Some(e.to_string())),
        };
        Self {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            what: format!("connect {raw_target}"),
            frequency,
            local_addr,
            remote_addr,
            error,
        }
    }

    /// True when the dial succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Write-only sink for connection attempts
pub trait EventLog: Send + Sync {
    /// Record an attempt; failures are the log's own concern
    fn record_connection_attempt(&self, attempt: &ConnectionAttempt);
}

/// Event log that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventLog;

impl EventLog for NullEventLog {
    fn record_connection_attempt(&self, _attempt: &ConnectionAttempt) {}
}

/// Append-only JSON-lines event log file
pub struct JsonEventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonEventLog {
    /// Open (or create) the log file for appending
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, attempt: &ConnectionAttempt) -> std::io::Result<()> {
        let line = serde_json::to_string(attempt)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl EventLog for JsonEventLog {
    fn record_connection_attempt(&self, attempt: &ConnectionAttempt) {
        if let Err(e) = self.write(attempt) {
            warn!("Unable to write event log {}: {}", self.path.display(), e);
        }
    }
}
