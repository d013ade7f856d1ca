//! Host-side client for the controller's line protocol.
//!
//! # Architecture
//!
//! ```text
//! fingerkey CLI / Registry
//!     │
//!     └─> HostClient ───(TCP)───> CommandServer ──> sensor
//!            │
//!            └─> LineCodec (Command out, DeviceLine in)
//! ```
//!
//! # Exchange
//!
//! Every command gets exactly one terminal response followed by one Ready.
//! [`HostClient::send_command`] returns the terminal response only after
//! that Ready has arrived, so the next command never overlaps the previous
//! one. Progress text printed by the controller in between is logged and
//! skipped.
//!
//! # Timeout Handling
//!
//! Commands are bounded by `response_timeout` (default 10 s). Enroll waits
//! for a person to place, lift and place a finger, so it uses the longer
//! `enroll_timeout` (default 60 s).
//!
//! # Example Usage
//!
//! ```no_run
//! use fingerkey_network::{HostClient, HostClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = HostClient::new(HostClientConfig::default());
//! client.connect().await?;
//!
//! let templates = client.count().await?;
//! println!("{templates} templates stored");
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use fingerkey_core::SlotId;
use fingerkey_core::constants::{DEFAULT_ENROLL_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS};
use fingerkey_protocol::{Command, CommandTag, DeviceLine, LineCodec, Response, ResponseKind};

/// Configuration for the host client
///
/// # Example
///
/// ```
/// use fingerkey_network::HostClientConfig;
/// use std::time::Duration;
///
/// let config = HostClientConfig::default().response_timeout(Duration::from_secs(2));
/// assert_eq!(config.enroll_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostClientConfig {
    /// Controller address to connect to
    pub server_addr: SocketAddr,

    /// Timeout for establishing the connection and the startup Ready
    pub connect_timeout: Duration,

    /// Timeout for verify, delete and count
    pub response_timeout: Duration,

    /// Timeout for enroll
    pub enroll_timeout: Duration,
}

impl Default for HostClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 7300)),
            connect_timeout: Duration::from_millis(3000),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            enroll_timeout: Duration::from_millis(DEFAULT_ENROLL_TIMEOUT_MS),
        }
    }
}

impl HostClientConfig {
    pub fn server_addr(mut self, addr: SocketAddr) -> Self {
        self.server_addr = addr;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn enroll_timeout(mut self, timeout: Duration) -> Self {
        self.enroll_timeout = timeout;
        self
    }

    /// Timeout applying to a whole exchange for `tag`.
    pub fn timeout_for(&self, tag: CommandTag) -> Duration {
        match tag {
            CommandTag::Enroll => self.enroll_timeout,
            _ => self.response_timeout,
        }
    }
}

/// Errors that can occur during host client operations
#[derive(Debug, Error)]
pub enum HostClientError {
    /// Client is not connected to the controller
    #[error("Not connected to controller")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// No terminal response or Ready within the command's timeout
    #[error("Response timeout after {0}ms")]
    ResponseTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The controller answered with something the exchange does not allow
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Protocol-level error from LineCodec
    #[error("Protocol error: {0}")]
    Protocol(#[from] fingerkey_core::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for one controller
pub struct HostClient {
    config: HostClientConfig,
    framed: Option<Framed<TcpStream, LineCodec>>,
}

impl HostClient {
    /// Create a new client. Call [`connect`](Self::connect) before use.
    ///
    /// ```
    /// use fingerkey_network::{HostClient, HostClientConfig};
    ///
    /// let client = HostClient::new(HostClientConfig::default());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(config: HostClientConfig) -> Self {
        debug!("Creating host client for controller {}", config.server_addr);
        Self {
            config,
            framed: None,
        }
    }

    pub fn config(&self) -> &HostClientConfig {
        &self.config
    }

    /// Connect and wait for the controller's startup Ready.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionTimeout` if either step takes longer than
    /// `connect_timeout`.
    pub async fn connect(&mut self) -> Result<(), HostClientError> {
        let addr = self.config.server_addr;
        let limit = self.config.connect_timeout;
        info!("Connecting to controller at {}", addr);

        let stream = match tokio::time::timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Connection failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", limit.as_millis());
                return Err(HostClientError::ConnectionTimeout(limit.as_millis() as u64));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let mut framed = Framed::new(stream, LineCodec::new());
        let deadline = Instant::now() + limit;
        let ready = match next_response(&mut framed, deadline, limit).await {
            Err(HostClientError::ResponseTimeout(ms)) => {
                return Err(HostClientError::ConnectionTimeout(ms));
            }
            other => other?,
        };

        if ready.kind() != ResponseKind::Ready {
            return Err(HostClientError::UnexpectedResponse(ready.to_line()));
        }
        info!("Controller ready: {}", ready.message());

        self.framed = Some(framed);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Send one command and return its terminal response.
    ///
    /// Returns after the trailing Ready has been received.
    ///
    /// # Errors
    ///
    /// Transport failures, timeouts, or a Ready where the terminal response
    /// should be. A response whose kind is Failure is not an error. Any
    /// error drops the connection, since a late reply would otherwise be
    /// read as the answer to the next command.
    pub async fn send_command(&mut self, command: Command) -> Result<Response, HostClientError> {
        let limit = self.config.timeout_for(command.tag);
        let framed = self.framed.as_mut().ok_or(HostClientError::NotConnected)?;

        match exchange(framed, command, limit).await {
            Ok(response) => {
                debug!("Command {} -> {}", command, response);
                Ok(response)
            }
            Err(e) => {
                warn!("Command {} failed, dropping connection: {}", command, e);
                self.framed = None;
                Err(e)
            }
        }
    }

    pub async fn enroll(&mut self, slot: SlotId) -> Result<Response, HostClientError> {
        self.send_command(Command::enroll(slot)).await
    }

    pub async fn verify(&mut self) -> Result<Response, HostClientError> {
        self.send_command(Command::verify()).await
    }

    pub async fn delete(&mut self, slot: SlotId) -> Result<Response, HostClientError> {
        self.send_command(Command::delete(slot)).await
    }

    /// Number of templates stored on the sensor.
    pub async fn count(&mut self) -> Result<u16, HostClientError> {
        let response = self.send_command(Command::count()).await?;
        match response.kind() {
            ResponseKind::Info => Ok(response.id()),
            _ => Err(HostClientError::UnexpectedResponse(response.to_line())),
        }
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), HostClientError> {
        if let Some(framed) = self.framed.take() {
            info!("Closing connection to {}", self.config.server_addr);

            let mut stream = framed.into_inner();
            let shutdown_timeout = Duration::from_millis(500);
            match tokio::time::timeout(shutdown_timeout, stream.shutdown()).await {
                Ok(Ok(())) => debug!("Shutdown completed"),
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!("Shutdown timeout ({}ms)", shutdown_timeout.as_millis()),
            }
        }
        Ok(())
    }
}

/// Write `command`, then read its terminal response and the Ready after it.
async fn exchange(
    framed: &mut Framed<TcpStream, LineCodec>,
    command: Command,
    limit: Duration,
) -> Result<Response, HostClientError> {
    let deadline = Instant::now() + limit;

    trace!("Sending command {}", command);
    match tokio::time::timeout_at(deadline, framed.send(command)).await {
        Ok(result) => result?,
        Err(_) => return Err(HostClientError::ResponseTimeout(limit.as_millis() as u64)),
    }

    let response = next_response(framed, deadline, limit).await?;
    if response.kind() == ResponseKind::Ready {
        return Err(HostClientError::UnexpectedResponse(response.to_line()));
    }

    let ready = next_response(framed, deadline, limit).await?;
    if ready.kind() != ResponseKind::Ready {
        return Err(HostClientError::UnexpectedResponse(ready.to_line()));
    }

    Ok(response)
}

/// Read lines until a response arrives, logging diagnostics on the way.
async fn next_response(
    framed: &mut Framed<TcpStream, LineCodec>,
    deadline: Instant,
    limit: Duration,
) -> Result<Response, HostClientError> {
    loop {
        match tokio::time::timeout_at(deadline, framed.next()).await {
            Ok(Some(Ok(DeviceLine::Response(response)))) => {
                trace!("Received {}", response.to_line());
                return Ok(response);
            }
            Ok(Some(Ok(DeviceLine::Diagnostic(text)))) => {
                debug!("Controller: {}", text);
            }
            Ok(Some(Err(e))) => {
                error!("Failed to decode controller output: {}", e);
                return Err(e.into());
            }
            Ok(None) => {
                warn!("Connection closed by controller");
                return Err(HostClientError::ConnectionLost(
                    "Controller closed connection".to_string(),
                ));
            }
            Err(_) => {
                warn!("Response timeout after {}ms", limit.as_millis());
                return Err(HostClientError::ResponseTimeout(limit.as_millis() as u64));
            }
        }
    }
}

impl Drop for HostClient {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("HostClient dropped while connected - connection will be closed");
        }
    }
}
