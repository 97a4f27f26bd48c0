//! # Hamlink Core Library
//!
//! Connection orchestration for point-to-point data sessions over
//! interchangeable radio and network transports:
//! - ARDOP and WINMOR sound-card modems (through a persistent TNC controller)
//! - AX.25 and serial packet TNCs
//! - Telnet
//!
//! ## Features
//!
//! - Connection strings with aliases (`ardop:///LA1B?freq=3601.5`)
//! - Lazy, initialize-once modem controllers
//! - Busy-channel wait with override
//! - QSY with guaranteed revert to the prior frequency
//! - Connection event log (JSON lines)
//! - Ordered fallback across several targets
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use hamlink_core::{AppConfig, BoxLink, Connector, Exchange, ExchangeError};
//!
//! struct Forwarder;
//!
//! #[async_trait]
//! impl Exchange for Forwarder {
//!     async fn exchange(
//!         &self,
//!         _link: BoxLink,
//!         remote: &str,
//!         _incoming: bool,
//!     ) -> Result<(), ExchangeError> {
//!         println!("exchanging with {remote}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let connector = Connector::new(config, Arc::new(Forwarder));
//!
//!     if !connector.connect_any(["cms", "telnet://cms.winlink.org:8772/WL2K"]).await {
//!         eprintln!("all targets failed");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;
pub mod logging;

// Re-exports for convenience
pub use crate::config::{AppConfig, ConfigError, TimingConfig};
pub use crate::core::busy::{BusyChannel, BusyGate, BusyOutcome, BusyReport, BusyTimeout};
pub use crate::core::connect::{apply_defaults, Connector};
pub use crate::core::error::ConnectError;
pub use crate::core::event_log::{ConnectionAttempt, EventLog, JsonEventLog, NullEventLog};
pub use crate::core::exchange::{Exchange, ExchangeError};
pub use crate::core::qsy::{FrequencyCoordinator, QsyError, Revert};
pub use crate::core::rig::{Frequency, Rig, RigError, RigHandle, RigSet};
pub use crate::core::target::{AliasTable, Params, Target, TargetError};
pub use crate::core::tnc::{
    ArqBandwidth, ControllerState, OperatingParam, Tnc, TncBackend, TncError, TncKind,
    TncRegistry, TncSettings,
};
pub use crate::core::transport::{
    BoxLink, Dialer, DialerSet, Link, TelnetDialer, TransportError, TransportKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
