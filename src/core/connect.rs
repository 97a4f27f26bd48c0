//! Connection establishment
//!
//! [`Connector`] is the orchestration context: it owns the controller
//! registry, the scheme-to-dialer mapping and the collaborators, and runs
//! one connection attempt per [`Connector::connect`] call:
//!
//! alias resolve → parse → controller ready + busy wait (modem transports)
//! → defaults → QSY → frequency sample → dial → event log → exchange.
//!
//! A QSY is always reverted before the call returns, whatever the outcome
//! of dial and exchange.

use crate::config::AppConfig;
use crate::core::busy::BusyGate;
use crate::core::error::ConnectError;
use crate::core::event_log::{ConnectionAttempt, EventLog, NullEventLog};
use crate::core::exchange::Exchange;
use crate::core::qsy::FrequencyCoordinator;
use crate::core::rig::RigSet;
use crate::core::target::{Target, TargetError};
use crate::core::tnc::{TncBackend, TncKind, TncRegistry};
use crate::core::transport::{
    BoxLink, Dialer, DialerSet, TelnetDialer, TransportError, TransportKind,
};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

/// Fill in what the connection string left out.
///
/// The identity defaults to the operator's call. An empty host is filled
/// per transport: the axport for AX.25, the device path (plus `baud`) for
/// serial TNCs. Other transports keep an empty host.
pub fn apply_defaults(target: &mut Target, config: &AppConfig) {
    if target.user.is_none() {
        target.user = Some(config.mycall.clone());
    }

    if !target.host.is_empty() {
        return;
    }
    match TransportKind::from_scheme(&target.scheme) {
        Some(TransportKind::Ax25) => {
            target.host = config.ax25.port.clone();
        }
        Some(TransportKind::SerialTnc) => {
            target.host = config.serial_tnc.path.clone();
            if config.serial_tnc.baudrate > 0 {
                target
                    .params
                    .set("baud", config.serial_tnc.baudrate.to_string());
            }
        }
        _ => {}
    }
}

/// Orchestration context for outgoing connections
pub struct Connector {
    config: Arc<AppConfig>,
    rigs: Arc<RigSet>,
    tncs: TncRegistry,
    dialers: DialerSet,
    event_log: Arc<dyn EventLog>,
    exchange: Arc<dyn Exchange>,
    ignore_busy: bool,
}

impl Connector {
    /// Create a connector with the telnet dialer registered and no radios
    pub fn new(config: AppConfig, exchange: Arc<dyn Exchange>) -> Self {
        let mut dialers = DialerSet::new();
        dialers.register(
            TransportKind::Telnet.scheme(),
            Arc::new(TelnetDialer::new(&config.telnet.password)),
        );

        Self {
            ignore_busy: config.ignore_busy,
            config: Arc::new(config),
            rigs: Arc::new(RigSet::new()),
            tncs: TncRegistry::new(),
            dialers,
            event_log: Arc::new(NullEventLog),
            exchange,
        }
    }

    /// Use this set of loaded radios
    #[must_use]
    pub fn with_rigs(mut self, rigs: RigSet) -> Self {
        self.rigs = Arc::new(rigs);
        self
    }

    /// Attach the backend for a modem transport
    #[must_use]
    pub fn with_tnc_backend(mut self, kind: TncKind, backend: Arc<dyn TncBackend>) -> Self {
        self.tncs = self.tncs.with_backend(kind, backend);
        self
    }

    /// Register a dialer for a transport without a persistent controller
    #[must_use]
    pub fn with_dialer(mut self, scheme: &str, dialer: Arc<dyn Dialer>) -> Self {
        self.dialers.register(scheme, dialer);
        self
    }

    /// Record attempts in this event log
    #[must_use]
    pub fn with_event_log(mut self, event_log: Arc<dyn EventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    /// Override the configured busy-channel behavior
    #[must_use]
    pub fn ignore_busy(mut self, ignore: bool) -> Self {
        self.ignore_busy = ignore;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Controller registry
    pub fn tncs(&self) -> &TncRegistry {
        &self.tncs
    }

    /// Loaded radios
    pub fn rigs(&self) -> &RigSet {
        &self.rigs
    }

    /// Try each candidate in order; true on the first success.
    ///
    /// Empty candidates are skipped.
    pub async fn connect_any<I, S>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for candidate in candidates {
            if self.connect(candidate.as_ref()).await {
                return true;
            }
        }
        false
    }

    /// Run one connection attempt; failures are logged and reported as `false`
    pub async fn connect(&self, raw: &str) -> bool {
        match self.try_connect(raw).await {
            Ok(()) => true,
            Err(ConnectError::Target(TargetError::Empty)) => false,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Run one connection attempt
    pub async fn try_connect(&self, raw: &str) -> Result<(), ConnectError> {
        if raw.trim().is_empty() {
            return Err(TargetError::Empty.into());
        }
        let span = info_span!("connect", target = %raw);
        self.establish(raw).instrument(span).await
    }

    async fn establish(&self, raw: &str) -> Result<(), ConnectError> {
        let resolved = self.config.connect_aliases.resolve(raw)?;
        if resolved != raw {
            debug!("Alias {} resolved to {}", raw, resolved);
        }
        let mut target = Target::parse(&resolved)?;

        if let Some(kind) = TncKind::from_scheme(&target.scheme) {
            let tnc = self
                .tncs
                .ensure_ready(kind, &self.config, &self.rigs)
                .await?;
            let gate = BusyGate {
                poll_interval: self.config.timing.busy_poll(),
                max_wait: self.config.timing.busy_timeout(),
            };
            gate.await_clear(&*tnc, self.ignore_busy).await?;
        }

        apply_defaults(&mut target, &self.config);

        let qsy = FrequencyCoordinator::new(&self.config, &self.rigs);
        let revert = match target.params.get("freq").filter(|f| !f.is_empty()) {
            Some(freq) => Some(qsy.qsy(&target.scheme, freq).await?),
            None => None,
        };

        let result = self.dial_and_exchange(&resolved, &target, &qsy).await;

        if let Some(revert) = revert {
            if let Err(e) = revert.apply().await {
                error!("{}", e);
            }
        }
        result
    }

    async fn dial_and_exchange(
        &self,
        raw: &str,
        target: &Target,
        qsy: &FrequencyCoordinator<'_>,
    ) -> Result<(), ConnectError> {
        let frequency = match qsy.rig_for_transport(&target.scheme) {
            Some(rig) => rig.frequency().await.ok(),
            None => None,
        };

        info!("Connecting to {} ({})...", target.station, target.scheme);
        let result = self.dial(target).await;
        self.event_log
            .record_connection_attempt(&ConnectionAttempt::new(raw, frequency, &result));
        let link = result.map_err(ConnectError::DialFailed)?;

        self.exchange
            .exchange(link, &target.station, false)
            .await
            .map_err(ConnectError::ExchangeFailed)?;

        info!("Disconnected.");
        Ok(())
    }

    async fn dial(&self, target: &Target) -> Result<BoxLink, TransportError> {
        let unsupported = || TransportError::UnsupportedScheme(target.scheme.clone());
        let timeout = self.config.timing.dial_timeout();

        let dialing = async {
            match TncKind::from_scheme(&target.scheme) {
                Some(kind) => {
                    let tnc = self.tncs.get(kind).ok_or_else(unsupported)?;
                    tnc.dial(target).await
                }
                None => {
                    let dialer = self.dialers.get(&target.scheme).ok_or_else(unsupported)?;
                    dialer.dial(target).await
                }
            }
        };

        tokio::time::timeout(timeout, dialing)
            .await
            .map_err(|_| TransportError::Timeout(timeout.as_secs()))?
    }
}
