//! Busy-channel gate
//!
//! Polls a controller's channel-occupancy flag before dialing so we do not
//! transmit on top of another station.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Channel occupancy, as reported by a transport controller
#[async_trait]
pub trait BusyChannel: Send + Sync {
    /// True while the channel is occupied
    async fn busy(&self) -> bool;
}

/// How the gate was passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyOutcome {
    /// Channel was (or became) clear
    Clear,
    /// Channel was busy and the override was set
    Ignored,
}

/// Result of a gate pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyReport {
    /// How the gate was passed
    pub outcome: BusyOutcome,
    /// Number of `busy()` observations
    pub polls: u32,
    /// Number of "waiting" notices logged
    pub notices: u32,
    /// Time spent waiting
    pub waited: Duration,
}

/// Channel still busy when the configured maximum wait ran out
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("channel still busy after {0:?}")]
pub struct BusyTimeout(pub Duration);

/// Busy-channel gate settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyGate {
    /// Interval between `busy()` polls
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits forever
    pub max_wait: Option<Duration>,
}

impl Default for BusyGate {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl BusyGate {
    /// Wait until `channel` reports clear.
    ///
    /// With `ignore_busy` set, the first busy observation is logged and the
    /// gate opens immediately.
    pub async fn await_clear<C: BusyChannel + ?Sized>(
        &self,
        channel: &C,
        ignore_busy: bool,
    ) -> Result<BusyReport, BusyTimeout> {
        let started = Instant::now();
        let mut report = BusyReport {
            outcome: BusyOutcome::Clear,
            polls: 0,
            notices: 0,
            waited: Duration::ZERO,
        };

        loop {
            report.polls += 1;
            if !channel.busy().await {
                break;
            }

            if ignore_busy {
                warn!("Ignoring busy channel!");
                report.outcome = BusyOutcome::Ignored;
                break;
            }
            if report.notices == 0 {
                info!("Waiting for clear channel...");
                report.notices += 1;
            }

            if let Some(max) = self.max_wait {
                if started.elapsed() >= max {
                    return Err(BusyTimeout(max));
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        report.waited = started.elapsed();
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Channel that reports busy for a fixed number of polls
    #[derive(Default)]
    pub struct ScriptedChannel {
        pub busy_polls: u32,
        pub always_busy: bool,
        pub polls: AtomicU32,
    }

    impl ScriptedChannel {
        pub fn busy_for(busy_polls: u32) -> Self {
            Self {
                busy_polls,
                ..Self::default()
            }
        }

        pub fn always_busy() -> Self {
            Self {
                always_busy: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BusyChannel for ScriptedChannel {
        async fn busy(&self) -> bool {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            self.always_busy || n < self.busy_polls
        }
    }
}
