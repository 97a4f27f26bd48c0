//! Hand-off to the message exchange protocol
//!
//! Once a link is up the session protocol (B2F forwarding, mailbox
//! updates, ...) takes over. It lives outside this crate; the establisher
//! only needs its outcome.

use crate::core::transport::BoxLink;
use async_trait::async_trait;
use thiserror::Error;

/// Exchange failure after the link was established
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Remote violated or aborted the session protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Link dropped
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session protocol run over an established link
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Run the session with `remote` until it completes
    async fn exchange(
        &self,
        link: BoxLink,
        remote: &str,
        incoming: bool,
    ) -> Result<(), ExchangeError>;
}
