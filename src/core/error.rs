//! Connection attempt errors
//!
//! Every failure ends the current attempt only; none is fatal to the
//! process.

use crate::core::busy::BusyTimeout;
use crate::core::exchange::ExchangeError;
use crate::core::qsy::QsyError;
use crate::core::target::TargetError;
use crate::core::tnc::TncError;
use crate::core::transport::TransportError;
use thiserror::Error;

/// Why a connection attempt failed
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Bad connection string or alias cycle; nothing was touched
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Controller initialization failed; retried from scratch next time
    #[error(transparent)]
    Tnc(#[from] TncError),

    /// Channel never cleared within the configured maximum wait
    #[error("Giving up: {0}")]
    Busy(#[from] BusyTimeout),

    /// QSY precondition or frequency change failed; no dial attempted
    #[error("Unable to QSY: {0}")]
    Qsy(#[from] QsyError),

    /// Never connected
    #[error("Unable to establish connection to remote: {0}")]
    DialFailed(#[source] TransportError),

    /// Connected, then the session failed
    #[error("Exchange failed: {0}")]
    ExchangeFailed(#[source] ExchangeError),
}

impl ConnectError {
    /// True if a link was established before the failure
    pub fn was_connected(&self) -> bool {
        matches!(self, Self::ExchangeFailed(_))
    }
}
