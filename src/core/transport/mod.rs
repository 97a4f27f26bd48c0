//! Transport layer for the supported connection kinds
//!
//! Supports:
//! - ARDOP and WINMOR (through a persistent TNC controller)
//! - AX.25 and serial packet TNCs (dialers injected by the host application)
//! - Telnet (CMS and peer-to-peer over TCP)

mod telnet;

pub use telnet::{TelnetDialer, DEFAULT_TELNET_PORT};

use crate::core::target::Target;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// Known transport kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// ARDOP sound-card modem
    Ardop,
    /// WINMOR sound-card modem
    Winmor,
    /// Linux kernel AX.25 packet
    Ax25,
    /// KISS/serial packet TNC
    SerialTnc,
    /// Telnet over TCP/IP
    Telnet,
}

impl TransportKind {
    /// All known kinds
    pub const ALL: [TransportKind; 5] = [
        Self::Ardop,
        Self::Winmor,
        Self::Ax25,
        Self::SerialTnc,
        Self::Telnet,
    ];

    /// URL scheme for this kind
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Ardop => "ardop",
            Self::Winmor => "winmor",
            Self::Ax25 => "ax25",
            Self::SerialTnc => "serial-tnc",
            Self::Telnet => "telnet",
        }
    }

    /// Look up a kind by URL scheme
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.scheme() == scheme)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ardop => write!(f, "ARDOP"),
            Self::Winmor => write!(f, "WINMOR"),
            Self::Ax25 => write!(f, "AX.25"),
            Self::SerialTnc => write!(f, "Serial TNC"),
            Self::Telnet => write!(f, "Telnet"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// No dialer for the scheme
    #[error("Unsupported transport scheme '{0}'")]
    UnsupportedScheme(String),

    /// Remote refused the login
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Backend refused a command
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An established, ready-to-use connection
pub trait Link: AsyncRead + AsyncWrite + Send + Unpin {
    /// Local end, for logging
    fn local_address(&self) -> String;

    /// Remote end, for logging
    fn remote_address(&self) -> String;
}

/// Boxed link handed to the exchange routine
pub type BoxLink = Box<dyn Link>;

impl Link for TcpStream {
    fn local_address(&self) -> String {
        self.local_addr().map(|a| a.to_string()).unwrap_or_default()
    }

    fn remote_address(&self) -> String {
        self.peer_addr().map(|a| a.to_string()).unwrap_or_default()
    }
}

impl Link for DuplexStream {
    fn local_address(&self) -> String {
        "pipe".to_string()
    }

    fn remote_address(&self) -> String {
        "pipe".to_string()
    }
}

/// Connect operation for one transport kind
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to the target's station
    async fn dial(&self, target: &Target) -> Result<BoxLink, TransportError>;
}

/// Scheme to dialer mapping for transports without a persistent controller
#[derive(Clone, Default)]
pub struct DialerSet {
    dialers: HashMap<String, Arc<dyn Dialer>>,
}

impl DialerSet {
    /// Create an empty dialer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialer for a scheme, replacing any previous one
    pub fn register(&mut self, scheme: &str, dialer: Arc<dyn Dialer>) -> &mut Self {
        self.dialers.insert(scheme.to_lowercase(), dialer);
        self
    }

    /// Look up the dialer for a scheme
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Dialer>> {
        self.dialers.get(scheme).cloned()
    }

    /// Check if a scheme has a dialer
    pub fn contains(&self, scheme: &str) -> bool {
        self.dialers.contains_key(scheme)
    }

    /// Registered schemes
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.dialers.keys().map(String::as_str)
    }
}

impl fmt::Debug for DialerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.dialers.keys()).finish()
    }
}
