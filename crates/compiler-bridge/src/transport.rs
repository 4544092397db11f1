//! Bridge transport
//!
//! Opens a fresh connection per command: connect, write one line (and an
//! optional payload), read one line, close.

use std::time::Duration;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use kedit_core::BridgeSettings;

use crate::protocol::CommandOutcome;
use crate::BridgeError;

/// One-shot request/response channel to the bridge.
///
/// Implementations never fail: every problem becomes an unsuccessful
/// `CommandOutcome` carrying a diagnostic.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Send a command line and read the single response line
    async fn send(&self, command: &str) -> CommandOutcome {
        self.send_with_payload(command, &[]).await
    }

    /// Send a command line followed by raw bytes, then read one line
    async fn send_with_payload(&self, command: &str, payload: &[u8]) -> CommandOutcome;
}

/// TCP transport to the bridge on the loopback mapping
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport for `address` (`host:port`)
    pub fn new(address: impl Into<String>) -> Self {
        let defaults = BridgeSettings::default();
        Self {
            address: address.into(),
            connect_timeout: defaults.connect_timeout(),
            read_timeout: defaults.read_timeout(),
        }
    }

    /// Create a transport from the configured bridge settings
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            address: settings.address(),
            connect_timeout: settings.connect_timeout(),
            read_timeout: settings.read_timeout(),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn exchange(&self, command: &str, payload: &[u8]) -> Result<String, BridgeError> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| BridgeError::Timeout("connecting to the bridge"))?
            .map_err(|source| BridgeError::Connect {
                address: self.address.clone(),
                source,
            })?;

        // The stream is dropped (and the socket closed) on every return path.
        let (reader, mut writer) = stream.into_split();

        writer.write_all(command.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        if !payload.is_empty() {
            writer.write_all(payload).await?;
        }
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let read = timeout(self.read_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| BridgeError::Timeout("waiting for the bridge response"))??;

        if read == 0 {
            return Err(BridgeError::EmptyResponse);
        }
        Ok(line)
    }
}

#[async_trait]
impl BridgeTransport for TcpTransport {
    async fn send_with_payload(&self, command: &str, payload: &[u8]) -> CommandOutcome {
        debug!("bridge {} <- {:?} (+{} bytes)", self.address, command, payload.len());

        match self.exchange(command, payload).await {
            Ok(line) => {
                let outcome = CommandOutcome::from_response(&line);
                debug!("bridge {} -> {:?}", self.address, outcome);
                outcome
            }
            Err(e) => {
                warn!("bridge command {:?} failed: {}", command, e);
                CommandOutcome::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use kedit_core::CompilationTracker;

    use crate::client::CompilerBridge;

    /// Accept one connection, capture the command line and any `SEND_SOURCE`
    /// payload the client sent, answer `response`
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);

            let mut header = String::new();
            reader.read_line(&mut header).await.unwrap();
            let mut received = header.clone().into_bytes();

            if header.starts_with("SEND_SOURCE ") {
                let len: usize = header.trim_end().rsplit(' ').next().unwrap().parse().unwrap();
                let mut payload = vec![0u8; len];
                reader.read_exact(&mut payload).await.unwrap();
                received.extend_from_slice(&payload);
            }

            reader.get_mut().write_all(response.as_bytes()).await.unwrap();
            received
        });
        (address, handle)
    }

    #[tokio::test]
    async fn test_success_line() {
        let (address, server) = one_shot_server("PONG\n").await;
        let outcome = TcpTransport::new(address).send("PING").await;

        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("PONG"));
        assert_eq!(server.await.unwrap(), b"PING\n");
    }

    #[tokio::test]
    async fn test_source_upload_wire_format() {
        let (address, server) = one_shot_server("OK\n").await;
        let bridge = CompilerBridge::new(TcpTransport::new(address), Arc::new(CompilationTracker::default()));

        // Multi-byte characters: the header carries the byte count
        let source = "fun main() {\n    println(\"héllo wörld ✓\")\n}\n";
        assert_ne!(source.len(), source.chars().count());
        let outcome = bridge.send_source("Main.kt", source).await;
        assert!(outcome.success, "{:?}", outcome);

        let mut expected = format!("SEND_SOURCE Main.kt {}\n", source.len()).into_bytes();
        expected.extend_from_slice(source.as_bytes());
        assert_eq!(server.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_payload_follows_header_without_separator() {
        let (address, server) = one_shot_server("OK\n").await;
        let outcome = TcpTransport::new(address)
            .send_with_payload("SEND_SOURCE A.java 3", b"x\ny")
            .await;

        assert!(outcome.success);
        assert_eq!(server.await.unwrap(), b"SEND_SOURCE A.java 3\nx\ny");
    }

    #[tokio::test]
    async fn test_error_line() {
        let (address, _server) = one_shot_server("ERROR: Unknown command\n").await;
        let outcome = TcpTransport::new(address).send("INVALID_COMMAND").await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("ERROR: Unknown command"));
    }

    #[tokio::test]
    async fn test_only_first_line_is_read() {
        let (address, _server) = one_shot_server("OK\nsecond line\n").await;
        let outcome = TcpTransport::new(address).send("PING").await;
        assert_eq!(outcome.output.as_deref(), Some("OK"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let outcome = TcpTransport::new(address).send("PING").await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_closed_without_answer_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let outcome = TcpTransport::new(address).send("PING").await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let outcome = TcpTransport::new(address)
            .with_read_timeout(Duration::from_millis(100))
            .send("STATUS x")
            .await;
        assert!(!outcome.success);
        assert!(outcome.error_text().contains("Timed out"));
    }
}
