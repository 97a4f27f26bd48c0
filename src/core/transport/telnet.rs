//! Telnet dialer
//!
//! Plain TCP connection followed by the CMS-style login exchange:
//! the server prompts `Callsign :` and `Password :`, each answered with a
//! CR-terminated line.

use super::{BoxLink, Dialer, TransportError};
use crate::core::target::Target;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Port used when the target host carries none
pub const DEFAULT_TELNET_PORT: u16 = 8772;

const CALLSIGN_PROMPT: &str = "Callsign :";
const PASSWORD_PROMPT: &str = "Password :";
const MAX_PROMPT_BYTES: usize = 4096;

/// Telnet dialer configuration and implementation
#[derive(Debug, Clone)]
pub struct TelnetDialer {
    /// Password used when the target URL carries none
    pub password: String,
    /// Timeout for TCP connect and login, each
    pub timeout: Duration,
}

impl TelnetDialer {
    /// Create a dialer with the given default password
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn address(host: &str) -> String {
        let has_port = match host.rsplit_once(':') {
            Some((h, port)) => !h.ends_with(':') && port.parse::<u16>().is_ok(),
            None => false,
        };
        if has_port {
            host.to_string()
        } else {
            format!("{host}:{DEFAULT_TELNET_PORT}")
        }
    }

    async fn login(
        &self,
        stream: &mut TcpStream,
        user: &str,
        password: &str,
    ) -> Result<(), TransportError> {
        let mut pending = Vec::with_capacity(256);
        read_until_prompt(stream, &mut pending, CALLSIGN_PROMPT).await?;
        stream.write_all(format!("{user}\r").as_bytes()).await?;
        read_until_prompt(stream, &mut pending, PASSWORD_PROMPT).await?;
        stream.write_all(format!("{password}\r").as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl Default for TelnetDialer {
    fn default() -> Self {
        Self::new("CMSTelnet")
    }
}

/// Read until `prompt` shows up in `pending`, then consume it together with
/// everything before it. Bytes received after the prompt stay in `pending`.
async fn read_until_prompt<R: AsyncRead + Unpin>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    prompt: &str,
) -> Result<(), TransportError> {
    let needle = prompt.as_bytes();
    let mut buf = [0u8; 256];

    loop {
        if let Some(pos) = find(pending, needle) {
            pending.drain(..pos + needle.len());
            return Ok(());
        }
        if pending.len() > MAX_PROMPT_BYTES {
            return Err(TransportError::LoginFailed(format!(
                "no '{prompt}' prompt from server"
            )));
        }
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(TransportError::LoginFailed(format!(
                "connection closed while waiting for '{prompt}'"
            )));
        }
        pending.extend_from_slice(&buf[..n]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[async_trait]
impl Dialer for TelnetDialer {
    async fn dial(&self, target: &Target) -> Result<BoxLink, TransportError> {
        if target.host.is_empty() {
            return Err(TransportError::ConnectionFailed(
                "telnet target has no host".to_string(),
            ));
        }
        let addr = Self::address(&target.host);
        let secs = self.timeout.as_secs();

        debug!("Telnet connect to {}", addr);
        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Timeout(secs))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        stream.set_nodelay(true)?;

        let user = target.user.as_deref().unwrap_or_default();
        let password = target.password.as_deref().unwrap_or(&self.password);

        tokio::time::timeout(self.timeout, self.login(&mut stream, user, password))
            .await
            .map_err(|_| TransportError::Timeout(secs))??;

        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_default_port() {
        assert_eq!(TelnetDialer::address("cms.winlink.org"), "cms.winlink.org:8772");
        assert_eq!(TelnetDialer::address("127.0.0.1:23"), "127.0.0.1:23");
        assert_eq!(TelnetDialer::address("[::1]"), "[::1]:8772");
        assert_eq!(TelnetDialer::address("[::1]:8000"), "[::1]:8000");
    }

    #[tokio::test]
    async fn test_prompt_split_across_reads() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"Welcome\r\nCall")
            .read(b"sign :")
            .build();
        let mut pending = Vec::new();
        read_until_prompt(&mut reader, &mut pending, CALLSIGN_PROMPT).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_both_prompts_in_one_read() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"Callsign :Password :")
            .build();
        let mut pending = Vec::new();
        read_until_prompt(&mut reader, &mut pending, CALLSIGN_PROMPT).await.unwrap();
        assert_eq!(pending, b"Password :");
        read_until_prompt(&mut reader, &mut pending, PASSWORD_PROMPT).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_closed_before_prompt() {
        let mut reader = tokio_test::io::Builder::new().read(b"bye\r\n").build();
        let mut pending = Vec::new();
        let err = read_until_prompt(&mut reader, &mut pending, CALLSIGN_PROMPT)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::LoginFailed(_)));
    }

    #[tokio::test]
    async fn test_login_sends_credentials() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = socket.into_split();
            let mut rd = tokio::io::BufReader::new(rd);
            let mut lines = Vec::new();
            for prompt in ["Callsign :", "Password :"] {
                wr.write_all(prompt.as_bytes()).await.unwrap();
                let mut line = Vec::new();
                rd.read_until(b'\r', &mut line).await.unwrap();
                lines.push(String::from_utf8(line).unwrap());
            }
            lines
        });

        let mut target = Target::parse(&format!("telnet://{host}/WL2K")).unwrap();
        target.user = Some("N0CALL".into());
        let link = TelnetDialer::default().dial(&target).await.unwrap();
        assert_eq!(link.remote_address(), host);

        let lines = server.await.unwrap();
        assert_eq!(lines, vec!["N0CALL\r".to_string(), "CMSTelnet\r".to_string()]);
    }

    #[tokio::test]
    async fn test_login_with_prompts_in_one_segment() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = socket.into_split();
            let mut rd = tokio::io::BufReader::new(rd);
            wr.write_all(b"Callsign :Password :").await.unwrap();
            let mut lines = Vec::new();
            for _ in 0..2 {
                let mut line = Vec::new();
                rd.read_until(b'\r', &mut line).await.unwrap();
                lines.push(String::from_utf8(line).unwrap());
            }
            lines
        });

        let mut target = Target::parse(&format!("telnet://{host}/WL2K")).unwrap();
        target.user = Some("N0CALL".into());
        let dialer = TelnetDialer::default().timeout(Duration::from_secs(5));
        dialer.dial(&target).await.unwrap();

        let lines = server.await.unwrap();
        assert_eq!(lines, vec!["N0CALL\r".to_string(), "CMSTelnet\r".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_host() {
        let target = Target::parse("telnet:///WL2K").unwrap();
        let err = TelnetDialer::default().dial(&target).await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }
}
