//! Radio control handles
//!
//! The rig-management collaborator loads radios and exposes them by name.
//! This module only defines the seam ([`Rig`]) and the shared lookup
//! ([`RigSet`]) the connection layer drives during QSY and PTT binding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Radio frequency in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(pub u64);

impl Frequency {
    /// Create from a value in Hz
    pub const fn from_hz(hz: u64) -> Self {
        Self(hz)
    }

    /// Value in Hz
    pub const fn hz(self) -> u64 {
        self.0
    }

    /// Parse a decimal kHz string such as `3601.5` or `14105`
    ///
    /// At most three fractional digits are accepted (1 Hz resolution).
    pub fn parse_khz(s: &str) -> Result<Self, ParseFrequencyError> {
        let s = s.trim();
        let err = || ParseFrequencyError(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let khz: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let mut hz_part = 0u64;
        for (i, digit) in frac.bytes().enumerate() {
            hz_part += u64::from(digit - b'0') * 10u64.pow(2 - i as u32);
        }

        khz.checked_mul(1000)
            .and_then(|hz| hz.checked_add(hz_part))
            .map(Self)
            .ok_or_else(err)
    }
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_khz(s)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// Frequency string that is not a decimal kHz value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid frequency '{0}' (expected kHz, e.g. 3601.5)")]
pub struct ParseFrequencyError(pub String);

/// Radio control error
#[derive(Error, Debug)]
pub enum RigError {
    /// Rig daemon or serial link not reachable
    #[error("rig unreachable: {0}")]
    Unreachable(String),

    /// Rig refused the command
    #[error("rig rejected command: {0}")]
    Rejected(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A controllable radio
#[async_trait]
pub trait Rig: Send + Sync {
    /// Read the current VFO frequency
    async fn frequency(&self) -> Result<Frequency, RigError>;

    /// Tune the VFO
    async fn set_frequency(&self, freq: Frequency) -> Result<(), RigError>;
}

/// Named, shareable reference to a loaded radio
#[derive(Clone)]
pub struct RigHandle {
    name: Arc<str>,
    rig: Arc<dyn Rig>,
    qsy_lock: Arc<Mutex<()>>,
}

impl RigHandle {
    /// Wrap a rig under the given name
    pub fn new(name: &str, rig: Arc<dyn Rig>) -> Self {
        Self {
            name: Arc::from(name),
            rig,
            qsy_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Configured rig name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the current frequency
    pub async fn frequency(&self) -> Result<Frequency, RigError> {
        self.rig.frequency().await
    }

    /// Tune the radio
    pub async fn set_frequency(&self, freq: Frequency) -> Result<(), RigError> {
        self.rig.set_frequency(freq).await
    }

    /// Take exclusive frequency control for the duration of a QSY.
    ///
    /// Held by the revert action until the prior frequency is restored.
    pub(crate) async fn lock_qsy(&self) -> OwnedMutexGuard<()> {
        self.qsy_lock.clone().lock_owned().await
    }
}

impl fmt::Debug for RigHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigHandle").field("name", &self.name).finish()
    }
}

/// The set of radios loaded at startup, looked up by name
#[derive(Debug, Clone, Default)]
pub struct RigSet {
    rigs: HashMap<String, RigHandle>,
}

impl RigSet {
    /// Create an empty rig set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a radio under the given name, replacing any previous one
    pub fn insert(&mut self, name: &str, rig: Arc<dyn Rig>) -> &mut Self {
        self.rigs.insert(name.to_string(), RigHandle::new(name, rig));
        self
    }

    /// Builder form of [`RigSet::insert`]
    #[must_use]
    pub fn with_rig(mut self, name: &str, rig: Arc<dyn Rig>) -> Self {
        self.insert(name, rig);
        self
    }

    /// Look up a radio by name
    pub fn get(&self, name: &str) -> Option<RigHandle> {
        self.rigs.get(name).cloned()
    }

    /// Names of all loaded radios
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rigs.keys().map(String::as_str)
    }

    /// Number of loaded radios
    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    /// True when no radio is loaded
    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRig;
    use super::*;

    #[test]
    fn test_parse_khz() {
        assert_eq!(Frequency::parse_khz("3601.5"), Ok(Frequency(3_601_500)));
        assert_eq!(Frequency::parse_khz("14105"), Ok(Frequency(14_105_000)));
        assert_eq!(Frequency::parse_khz("7.001"), Ok(Frequency(7_001)));
        assert_eq!(Frequency::parse_khz(".5"), Ok(Frequency(500)));
        assert!(Frequency::parse_khz("").is_err());
        assert!(Frequency::parse_khz("abc").is_err());
        assert!(Frequency::parse_khz("3601.5001").is_err());
        assert!(Frequency::parse_khz("-3601").is_err());
    }

    #[test]
    fn test_display_khz() {
        assert_eq!(Frequency(3_601_500).to_string(), "3601.500");
        assert_eq!(Frequency(7_001).to_string(), "7.001");
    }

    #[tokio::test]
    async fn test_rig_set_lookup() {
        let rig = FakeRig::tuned_to(7_050_000);
        let rigs = RigSet::new().with_rig("ic7300", rig.clone());

        assert_eq!(rigs.len(), 1);
        assert!(rigs.get("ft891").is_none());

        let handle = rigs.get("ic7300").unwrap();
        assert_eq!(handle.name(), "ic7300");
        handle.set_frequency(Frequency(7_060_000)).await.unwrap();
        assert_eq!(handle.frequency().await.unwrap(), Frequency(7_060_000));
        assert_eq!(rig.sets(), vec![Frequency(7_060_000)]);
    }
}
