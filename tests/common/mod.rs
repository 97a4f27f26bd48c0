//! Fakes for the collaborators a `Connector` drives

#![allow(dead_code)]

use async_trait::async_trait;
use hamlink_core::{
    BoxLink, BusyChannel, ConnectionAttempt, Dialer, EventLog, Exchange, ExchangeError,
    Frequency, OperatingParam, Rig, RigError, RigHandle, Target, Tnc, TncBackend, TncSettings,
    TransportError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Radio remembering every frequency it was told to use
pub struct MockRig {
    pub current: Mutex<Frequency>,
    pub sets: Mutex<Vec<Frequency>>,
}

impl MockRig {
    pub fn new(hz: u64) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Frequency::from_hz(hz)),
            sets: Mutex::new(Vec::new()),
        })
    }

    pub fn sets(&self) -> Vec<Frequency> {
        self.sets.lock().clone()
    }
}

#[async_trait]
impl Rig for MockRig {
    async fn frequency(&self) -> Result<Frequency, RigError> {
        Ok(*self.current.lock())
    }

    async fn set_frequency(&self, freq: Frequency) -> Result<(), RigError> {
        self.sets.lock().push(freq);
        *self.current.lock() = freq;
        Ok(())
    }
}

/// Modem controller with a scripted busy channel
#[derive(Default)]
pub struct MockTnc {
    pub busy_for: u32,
    pub busy_polls: AtomicU32,
    pub dials: AtomicU32,
    pub refuse: bool,
}

impl MockTnc {
    pub fn polls(&self) -> u32 {
        self.busy_polls.load(Ordering::SeqCst)
    }

    pub fn dials(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusyChannel for MockTnc {
    async fn busy(&self) -> bool {
        self.busy_polls.fetch_add(1, Ordering::SeqCst) < self.busy_for
    }
}

#[async_trait]
impl Tnc for MockTnc {
    async fn version(&self) -> Result<String, TransportError> {
        Ok("1.0.4".to_string())
    }

    async fn set_param(&self, _param: &OperatingParam) -> Result<(), TransportError> {
        Ok(())
    }

    fn set_ptt(&self, _rig: RigHandle) {}

    async fn dial(&self, _target: &Target) -> Result<BoxLink, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(TransportError::ConnectionFailed("no answer".into()));
        }
        let (local, _remote) = tokio::io::duplex(64);
        Ok(Box::new(local))
    }
}

/// Backend counting how often it is opened
pub struct MockBackend {
    pub tnc: Arc<MockTnc>,
    pub opens: AtomicU32,
}

impl MockBackend {
    pub fn new(tnc: MockTnc) -> Arc<Self> {
        Arc::new(Self {
            tnc: Arc::new(tnc),
            opens: AtomicU32::new(0),
        })
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TncBackend for MockBackend {
    async fn open(&self, _settings: &TncSettings) -> Result<Arc<dyn Tnc>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.tnc.clone())
    }
}

/// Dialer recording targets, optionally refusing
#[derive(Default)]
pub struct MockDialer {
    pub dialed: Mutex<Vec<Target>>,
    pub refuse: bool,
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, target: &Target) -> Result<BoxLink, TransportError> {
        self.dialed.lock().push(target.clone());
        if self.refuse {
            return Err(TransportError::ConnectionFailed("refused".into()));
        }
        let (local, _remote) = tokio::io::duplex(64);
        Ok(Box::new(local))
    }
}

/// Exchange recording remote stations
#[derive(Default)]
pub struct MockExchange {
    pub remotes: Mutex<Vec<String>>,
    pub fail: bool,
}

impl MockExchange {
    pub fn remotes(&self) -> Vec<String> {
        self.remotes.lock().clone()
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn exchange(
        &self,
        _link: BoxLink,
        remote: &str,
        _incoming: bool,
    ) -> Result<(), ExchangeError> {
        self.remotes.lock().push(remote.to_string());
        if self.fail {
            return Err(ExchangeError::Protocol("session aborted".into()));
        }
        Ok(())
    }
}

/// In-memory event log
#[derive(Default)]
pub struct MockEventLog {
    pub attempts: Mutex<Vec<ConnectionAttempt>>,
}

impl MockEventLog {
    pub fn attempts(&self) -> Vec<ConnectionAttempt> {
        self.attempts.lock().clone()
    }
}

impl EventLog for MockEventLog {
    fn record_connection_attempt(&self, attempt: &ConnectionAttempt) {
        self.attempts.lock().push(attempt.clone());
    }
}
