//! Transport controller (TNC) registry
//!
//! Sound-card modem transports are driven through a long-lived controller
//! process. The registry owns one controller slot per [`TncKind`], creates
//! the controller on first use and hands the same instance to every later
//! connection attempt. There is no teardown or reconfigure path: once a
//! slot is ready it stays ready for the life of the registry.

use crate::config::AppConfig;
use crate::core::busy::BusyChannel;
use crate::core::rig::{RigHandle, RigSet};
use crate::core::target::Target;
use crate::core::transport::{BoxLink, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Transport kinds backed by a persistent controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TncKind {
    /// ARDOP
    Ardop,
    /// WINMOR
    Winmor,
}

impl TncKind {
    /// URL scheme for this kind
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Ardop => "ardop",
            Self::Winmor => "winmor",
        }
    }

    /// Controller kind for a URL scheme, if the scheme needs one
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "ardop" => Some(Self::Ardop),
            "winmor" => Some(Self::Winmor),
            _ => None,
        }
    }
}

impl fmt::Display for TncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ardop => write!(f, "ARDOP"),
            Self::Winmor => write!(f, "WINMOR"),
        }
    }
}

/// ARDOP ARQ bandwidth, e.g. `500MAX` or `2000FORCED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArqBandwidth {
    /// Bandwidth in Hz
    pub max_hz: u16,
    /// Disallow negotiating a narrower bandwidth
    pub forced: bool,
}

impl FromStr for ArqBandwidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let (digits, forced) = if let Some(d) = upper.strip_suffix("FORCED") {
            (d, true)
        } else if let Some(d) = upper.strip_suffix("MAX") {
            (d, false)
        } else {
            (upper.as_str(), false)
        };
        let max_hz = digits
            .parse()
            .map_err(|_| format!("invalid ARQ bandwidth '{s}'"))?;
        Ok(Self { max_hz, forced })
    }
}

impl TryFrom<String> for ArqBandwidth {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ArqBandwidth> for String {
    fn from(bw: ArqBandwidth) -> Self {
        bw.to_string()
    }
}

impl fmt::Display for ArqBandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.forced { "FORCED" } else { "MAX" };
        write!(f, "{}{}", self.max_hz, suffix)
    }
}

/// Operating parameter applied during controller initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatingParam {
    /// ARQ session bandwidth
    ArqBandwidth(ArqBandwidth),
    /// CW identification after transmissions
    CwId(bool),
}

impl OperatingParam {
    /// Short name for log and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::ArqBandwidth(_) => "ARQ bandwidth",
            Self::CwId(_) => "CWID",
        }
    }
}

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Never opened, or the last initialization failed
    Uninitialized,
    /// Initialization in progress
    Initializing,
    /// Opened, configured and dialable
    Ready,
}

/// Controller initialization error
#[derive(Error, Debug)]
pub enum TncError {
    /// No backend registered for this kind
    #[error("{0} TNC initialization failed: no backend available")]
    NoBackend(TncKind),

    /// Open or version query failed
    #[error("{kind} TNC initialization failed: {source}")]
    BackendUnreachable {
        /// Controller kind
        kind: TncKind,
        /// Underlying error
        #[source]
        source: TransportError,
    },

    /// An operating parameter was refused
    #[error("Unable to set {param} for {kind} TNC: {source}")]
    BackendRejectedParam {
        /// Controller kind
        kind: TncKind,
        /// Parameter name
        param: &'static str,
        /// Underlying error
        #[source]
        source: TransportError,
    },

    /// PTT control requested for a rig that is not loaded
    #[error("Unable to set PTT rig '{rig}' for {kind} TNC: Not defined or not loaded")]
    PttRigNotLoaded {
        /// Controller kind
        kind: TncKind,
        /// Configured rig name
        rig: String,
    },
}

/// Settings passed to a backend when opening a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TncSettings {
    /// Controller address (host:port)
    pub addr: String,
    /// Operator call sign
    pub mycall: String,
    /// Maidenhead locator
    pub locator: String,
}

/// An open transport controller
#[async_trait]
pub trait Tnc: BusyChannel {
    /// Version string reported by the backend
    async fn version(&self) -> Result<String, TransportError>;

    /// Apply an operating parameter
    async fn set_param(&self, param: &OperatingParam) -> Result<(), TransportError>;

    /// Key transmit through this radio
    fn set_ptt(&self, rig: RigHandle);

    /// Connect to the target's station
    async fn dial(&self, target: &Target) -> Result<BoxLink, TransportError>;
}

/// Factory opening a controller for one kind
#[async_trait]
pub trait TncBackend: Send + Sync {
    /// Open the controller connection or process
    async fn open(&self, settings: &TncSettings) -> Result<Arc<dyn Tnc>, TransportError>;
}

struct Slot {
    backend: Arc<dyn TncBackend>,
    controller: OnceCell<Arc<dyn Tnc>>,
    initializing: AtomicBool,
}

/// Per-kind controller slots
#[derive(Default)]
pub struct TncRegistry {
    slots: HashMap<TncKind, Slot>,
}

impl TncRegistry {
    /// Create a registry without backends
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the backend used to open controllers of `kind`
    #[must_use]
    pub fn with_backend(mut self, kind: TncKind, backend: Arc<dyn TncBackend>) -> Self {
        self.slots.insert(
            kind,
            Slot {
                backend,
                controller: OnceCell::new(),
                initializing: AtomicBool::new(false),
            },
        );
        self
    }

    /// Current lifecycle state of a slot
    pub fn state(&self, kind: TncKind) -> ControllerState {
        match self.slots.get(&kind) {
            Some(slot) if slot.controller.initialized() => ControllerState::Ready,
            Some(slot) if slot.initializing.load(Ordering::SeqCst) => {
                ControllerState::Initializing
            }
            _ => ControllerState::Uninitialized,
        }
    }

    /// Ready controller for `kind`, without initializing
    pub fn get(&self, kind: TncKind) -> Option<Arc<dyn Tnc>> {
        self.slots.get(&kind)?.controller.get().cloned()
    }

    /// Return the controller for `kind`, opening and configuring it on first use.
    ///
    /// Repeat calls return the existing controller without contacting the
    /// backend. A failed initialization leaves the slot uninitialized so the
    /// next call starts from scratch. Concurrent first calls initialize once.
    pub async fn ensure_ready(
        &self,
        kind: TncKind,
        config: &AppConfig,
        rigs: &RigSet,
    ) -> Result<Arc<dyn Tnc>, TncError> {
        let slot = self.slots.get(&kind).ok_or(TncError::NoBackend(kind))?;

        if let Some(tnc) = slot.controller.get() {
            return Ok(tnc.clone());
        }

        slot.controller
            .get_or_try_init(|| async {
                let _flag = InitializingFlag::raise(&slot.initializing);
                initialize(kind, slot.backend.as_ref(), config, rigs).await
            })
            .await
            .cloned()
    }
}

/// Marks a slot as initializing until dropped, including when the
/// initialization future is cancelled.
struct InitializingFlag<'a>(&'a AtomicBool);

impl<'a> InitializingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InitializingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for TncRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in self.slots.keys() {
            map.entry(kind, &self.state(*kind));
        }
        map.finish()
    }
}

fn settings_for(kind: TncKind, config: &AppConfig) -> TncSettings {
    let addr = match kind {
        TncKind::Ardop => &config.ardop.addr,
        TncKind::Winmor => &config.winmor.addr,
    };
    TncSettings {
        addr: addr.clone(),
        mycall: config.mycall.clone(),
        locator: config.locator.clone(),
    }
}

fn params_for(kind: TncKind, config: &AppConfig) -> Vec<OperatingParam> {
    match kind {
        TncKind::Ardop => {
            let mut params = Vec::new();
            if let Some(bw) = config.ardop.arq_bandwidth {
                params.push(OperatingParam::ArqBandwidth(bw));
            }
            params.push(OperatingParam::CwId(config.ardop.cwid));
            params
        }
        TncKind::Winmor => Vec::new(),
    }
}

fn ptt_rig_for(kind: TncKind, config: &AppConfig) -> Option<&str> {
    match kind {
        TncKind::Ardop if config.ardop.ptt_control => Some(config.ardop.rig.as_str()),
        TncKind::Winmor if config.winmor.ptt_control => Some(config.winmor.rig.as_str()),
        _ => None,
    }
}

async fn initialize(
    kind: TncKind,
    backend: &dyn TncBackend,
    config: &AppConfig,
    rigs: &RigSet,
) -> Result<Arc<dyn Tnc>, TncError> {
    let settings = settings_for(kind, config);
    debug!("Opening {} TNC at {}", kind, settings.addr);

    let unreachable = |source| TncError::BackendUnreachable { kind, source };
    let tnc = backend.open(&settings).await.map_err(unreachable)?;
    let version = tnc.version().await.map_err(unreachable)?;

    for param in params_for(kind, config) {
        tnc.set_param(&param)
            .await
            .map_err(|source| TncError::BackendRejectedParam {
                kind,
                param: param.name(),
                source,
            })?;
    }

    if let Some(rig_name) = ptt_rig_for(kind, config) {
        let rig = rigs.get(rig_name).ok_or_else(|| TncError::PttRigNotLoaded {
            kind,
            rig: rig_name.to_string(),
        })?;
        tnc.set_ptt(rig);
    }

    info!("{} TNC ({}) initialized", kind, version);
    Ok(tnc)
}
