//! Core module containing the connection orchestration layer
//!
//! This module provides:
//! - Connection target parsing and alias resolution
//! - Transport dialers and the scheme-to-dialer mapping
//! - Modem controller (TNC) registry with lazy initialization
//! - Busy-channel gate
//! - Frequency coordination (QSY) with guaranteed revert
//! - Connection event log
//! - Session establishment and multi-target fallback

pub mod busy;
pub mod connect;
pub mod error;
pub mod event_log;
pub mod exchange;
pub mod qsy;
pub mod rig;
pub mod target;
pub mod tnc;
pub mod transport;
