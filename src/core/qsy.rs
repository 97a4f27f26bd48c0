//! Frequency coordination (QSY)
//!
//! Tunes the radio bound to a transport before dialing and restores the
//! previous frequency afterwards. A successful [`FrequencyCoordinator::qsy`]
//! returns a [`Revert`] that must be applied exactly once; while it is alive
//! no other QSY can be started on the same radio.

use crate::config::AppConfig;
use crate::core::rig::{Frequency, ParseFrequencyError, RigError, RigHandle, RigSet};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

/// QSY error
#[derive(Error, Debug)]
pub enum QsyError {
    /// Transport has no rig setting
    #[error("Not supported with transport '{0}'")]
    UnsupportedTransport(String),

    /// Rig setting is empty
    #[error("Missing rig reference in config section for {0}, don't know which rig to qsy")]
    MissingRigBinding(String),

    /// Named rig is not loaded
    #[error("Rig '{0}' not loaded")]
    RigNotLoaded(String),

    /// `freq` parameter is not a frequency
    #[error(transparent)]
    InvalidFrequency(#[from] ParseFrequencyError),

    /// Reading or setting the frequency failed before the change took effect
    #[error("Unable to set frequency on rig '{rig}': {source}")]
    SetFrequency {
        /// Rig name
        rig: String,
        /// Underlying error
        #[source]
        source: RigError,
    },

    /// Restoring the prior frequency failed; the radio stays on the QSY frequency
    #[error("Unable to revert rig '{rig}' to {prior} kHz: {source}")]
    RevertFailed {
        /// Rig name
        rig: String,
        /// Frequency that could not be restored
        prior: Frequency,
        /// Underlying error
        #[source]
        source: RigError,
    },
}

/// Resolves transport rig bindings and performs QSY
pub struct FrequencyCoordinator<'a> {
    config: &'a AppConfig,
    rigs: &'a RigSet,
    settle: Duration,
    revert_settle: Duration,
}

impl<'a> FrequencyCoordinator<'a> {
    /// Create a coordinator using the configured settling delays
    pub fn new(config: &'a AppConfig, rigs: &'a RigSet) -> Self {
        Self {
            config,
            rigs,
            settle: config.timing.qsy_settle(),
            revert_settle: config.timing.revert_settle(),
        }
    }

    /// Radio bound to a transport, if one is configured and loaded
    pub fn rig_for_transport(&self, scheme: &str) -> Option<RigHandle> {
        match self.config.rig_binding(scheme) {
            Some(name) if !name.is_empty() => self.rigs.get(name),
            _ => None,
        }
    }

    /// Tune the transport's radio to `freq` (kHz) and wait for it to settle.
    ///
    /// Precondition failures happen before any frequency is set.
    pub async fn qsy(&self, scheme: &str, freq: &str) -> Result<Revert, QsyError> {
        let rig_name = self
            .config
            .rig_binding(scheme)
            .ok_or_else(|| QsyError::UnsupportedTransport(scheme.to_string()))?;
        if rig_name.is_empty() {
            return Err(QsyError::MissingRigBinding(scheme.to_string()));
        }
        let rig = self
            .rigs
            .get(rig_name)
            .ok_or_else(|| QsyError::RigNotLoaded(rig_name.to_string()))?;
        let new_freq = Frequency::parse_khz(freq)?;

        let lock = rig.lock_qsy().await;
        info!("QSY {}: {}", scheme, freq);

        let set_failed = |source| QsyError::SetFrequency {
            rig: rig.name().to_string(),
            source,
        };
        let prior = rig.frequency().await.map_err(set_failed)?;
        rig.set_frequency(new_freq).await.map_err(set_failed)?;

        tokio::time::sleep(self.settle).await;

        Ok(Revert {
            inner: Some(PendingRevert {
                prior,
                rig,
                scheme: scheme.to_string(),
                settle: self.revert_settle,
                _lock: lock,
            }),
        })
    }
}

struct PendingRevert {
    prior: Frequency,
    rig: RigHandle,
    scheme: String,
    settle: Duration,
    _lock: OwnedMutexGuard<()>,
}

impl PendingRevert {
    async fn run(self) -> Result<(), QsyError> {
        tokio::time::sleep(self.settle).await;
        info!("QSX {}: {}", self.scheme, self.prior);
        self.rig
            .set_frequency(self.prior)
            .await
            .map_err(|source| QsyError::RevertFailed {
                rig: self.rig.name().to_string(),
                prior: self.prior,
                source,
            })
    }
}

/// Restores a radio's prior frequency after a QSY
///
/// Apply it with [`Revert::apply`]. If it is dropped unapplied (for
/// example when the connecting task is cancelled) the revert is spawned on
/// the current runtime instead.
#[must_use = "a QSY must be reverted"]
pub struct Revert {
    inner: Option<PendingRevert>,
}

impl Revert {
    /// Frequency that will be restored
    pub fn prior_frequency(&self) -> Option<Frequency> {
        self.inner.as_ref().map(|p| p.prior)
    }

    /// Radio that will be reverted
    pub fn rig(&self) -> Option<&RigHandle> {
        self.inner.as_ref().map(|p| &p.rig)
    }

    /// Wait for the radio to settle and restore the prior frequency
    pub async fn apply(mut self) -> Result<(), QsyError> {
        match self.inner.take() {
            Some(pending) => pending.run().await,
            None => Ok(()),
        }
    }
}

impl Drop for Revert {
    fn drop(&mut self) {
        let Some(pending) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    "QSY on rig '{}' dropped unapplied, reverting in background",
                    pending.rig.name()
                );
                handle.spawn(async move {
                    if let Err(e) = pending.run().await {
                        error!("{}", e);
                    }
                });
            }
            Err(_) => {
                error!(
                    "QSY on rig '{}' dropped outside a runtime, radio left off {} kHz",
                    pending.rig.name(),
                    pending.prior
                );
            }
        }
    }
}

impl std::fmt::Debug for Revert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Revert")
            .field("prior", &self.prior_frequency())
            .field("rig", &self.rig().map(RigHandle::name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rig::testing::FakeRig;
    use std::sync::Arc;

    fn setup(rig: Arc<FakeRig>) -> (AppConfig, RigSet) {
        let mut config = AppConfig::default();
        config.ardop.rig = "ic7300".into();
        let rigs = RigSet::new().with_rig("ic7300", rig);
        (config, rigs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_qsy_and_revert() {
        let rig = FakeRig::tuned_to(7_050_000);
        let (config, rigs) = setup(rig.clone());
        let qsy = FrequencyCoordinator::new(&config, &rigs);

        let started = tokio::time::Instant::now();
        let revert = qsy.qsy("ardop", "3601.5").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(revert.prior_frequency(), Some(Frequency(7_050_000)));
        assert_eq!(rig.sets(), vec![Frequency(3_601_500)]);

        let started = tokio::time::Instant::now();
        revert.apply().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(rig.sets(), vec![Frequency(3_601_500), Frequency(7_050_000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preconditions_touch_no_radio() {
        let rig = FakeRig::tuned_to(7_050_000);
        let (mut config, rigs) = setup(rig.clone());

        let qsy = FrequencyCoordinator::new(&config, &rigs);
        assert!(matches!(
            qsy.qsy("telnet", "7050").await,
            Err(QsyError::UnsupportedTransport(s)) if s == "telnet"
        ));
        assert!(matches!(
            qsy.qsy("winmor", "7050").await,
            Err(QsyError::MissingRigBinding(_))
        ));
        assert!(matches!(
            qsy.qsy("ardop", "seven").await,
            Err(QsyError::InvalidFrequency(_))
        ));

        config.ax25.rig = "ft891".into();
        let qsy = FrequencyCoordinator::new(&config, &rigs);
        assert!(matches!(
            qsy.qsy("ax25", "144800").await,
            Err(QsyError::RigNotLoaded(name)) if name == "ft891"
        ));

        assert!(rig.sets().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_revert_failure_is_reported() {
        let rig = FakeRig::tuned_to(7_050_000);
        let (config, rigs) = setup(rig.clone());
        let qsy = FrequencyCoordinator::new(&config, &rigs);

        let mut revert = qsy.qsy("ardop", "3601.5").await.unwrap();
        let failing = Arc::new(FakeRig {
            fail_sets: true,
            ..FakeRig::default()
        });
        // Swap the radio out from under the pending revert.
        if let Some(pending) = revert.inner.as_mut() {
            pending.rig = RigHandle::new("ic7300", failing);
        }

        let err = revert.apply().await.unwrap_err();
        assert!(matches!(err, QsyError::RevertFailed { prior: Frequency(7_050_000), .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_qsy_waits_for_revert() {
        let rig = FakeRig::tuned_to(7_050_000);
        let (config, rigs) = setup(rig.clone());
        let qsy = FrequencyCoordinator::new(&config, &rigs);

        let first = qsy.qsy("ardop", "3601.5").await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(10), qsy.qsy("ardop", "3603")).await;
        assert!(second.is_err());

        first.apply().await.unwrap();
        let second = qsy.qsy("ardop", "3603").await.unwrap();
        assert_eq!(second.prior_frequency(), Some(Frequency(7_050_000)));
        second.apply().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_revert_runs_in_background() {
        let rig = FakeRig::tuned_to(7_050_000);
        let (config, rigs) = setup(rig.clone());
        let qsy = FrequencyCoordinator::new(&config, &rigs);

        drop(qsy.qsy("ardop", "3601.5").await.unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*rig.current.lock(), Frequency(7_050_000));
    }

    #[test]
    fn test_rig_for_transport() {
        let (config, rigs) = setup(FakeRig::tuned_to(1));
        let qsy = FrequencyCoordinator::new(&config, &rigs);
        assert!(qsy.rig_for_transport("ardop").is_some());
        assert!(qsy.rig_for_transport("winmor").is_none());
        assert!(qsy.rig_for_transport("telnet").is_none());
    }
}
