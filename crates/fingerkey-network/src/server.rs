//! TCP front end for the controller.
//!
//! The controller speaks its line protocol over any byte stream. This
//! module exposes it on a TCP port so a host process can drive a sensor
//! attached to another machine.
//!
//! # Architecture
//!
//! ```text
//! host ──(TCP)──> CommandServer ──> Dispatcher ──> SensorPort
//!                      │
//!                      └──> one session at a time
//! ```
//!
//! # Design Principles
//!
//! - **One host at a time**: the sensor is a single physical device, so the
//!   accept loop serves each session to completion before accepting the
//!   next. Further connections wait in the listen backlog.
//! - **No authentication, no TLS**: bind to loopback unless the network is
//!   trusted.
//! - **Sensor survives sessions**: the sensor is handed from one session's
//!   dispatcher to the next.
//!
//! # Example Usage
//!
//! ```no_run
//! use fingerkey_controller::ControllerConfig;
//! use fingerkey_hardware::mock::MockSensor;
//! use fingerkey_network::{CommandServer, CommandServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sensor, _handle) = MockSensor::new();
//! let server = CommandServer::bind(CommandServerConfig::default()).await?;
//! server.serve(sensor, ControllerConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use fingerkey_controller::{ControllerConfig, Dispatcher};
use fingerkey_hardware::SensorPort;

/// Configuration for the command server
///
/// # Example
///
/// ```
/// use fingerkey_network::CommandServerConfig;
///
/// let config = CommandServerConfig::default().max_sessions(Some(1));
/// assert_eq!(config.bind_addr.port(), 7300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// Stop after this many sessions. `None` serves forever.
    pub max_sessions: Option<usize>,
}

impl Default for CommandServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7300)),
            max_sessions: None,
        }
    }
}

impl CommandServerConfig {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn max_sessions(mut self, sessions: Option<usize>) -> Self {
        self.max_sessions = sessions;
        self
    }
}

/// Errors that can occur during command server operations
#[derive(Debug, Error)]
pub enum CommandServerError {
    /// Failed to bind to address
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about one host session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Remote host address
    pub remote_addr: SocketAddr,

    /// When the session started
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            connected_at: Utc::now(),
        }
    }

    /// How long the session has lasted so far
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }
}

/// TCP server running the controller's dispatcher
pub struct CommandServer {
    listener: TcpListener,
    config: CommandServerConfig,
}

impl CommandServer {
    /// Bind the server to the configured address
    ///
    /// # Errors
    ///
    /// Returns `BindFailed` if the address is in use or not permitted.
    pub async fn bind(config: CommandServerConfig) -> Result<Self, CommandServerError> {
        info!("Binding command server to {}", config.bind_addr);

        let listener = TcpListener::bind(config.bind_addr).await.map_err(|source| {
            CommandServerError::BindFailed {
                addr: config.bind_addr,
                source,
            }
        })?;

        Ok(Self { listener, config })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, CommandServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept hosts one after another and serve each through a dispatcher.
    ///
    /// A session ending with an error is logged and does not stop the
    /// server. Returns the sensor once `max_sessions` have been served.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener itself fails.
    pub async fn serve<P: SensorPort>(
        &self,
        mut sensor: P,
        controller: ControllerConfig,
    ) -> Result<P, CommandServerError> {
        info!(
            "Command server listening on {}",
            self.listener.local_addr()?
        );
        let mut served = 0usize;

        while self.config.max_sessions.is_none_or(|max| served < max) {
            let (stream, addr) = self.listener.accept().await?;
            let session = SessionInfo::new(addr);
            info!("Host connected from {}", addr);

            sensor = Self::run_session(sensor, stream, &session, &controller).await;
            served += 1;
        }

        info!("Served {} session(s), stopping", served);
        Ok(sensor)
    }

    async fn run_session<P: SensorPort>(
        sensor: P,
        stream: TcpStream,
        session: &SessionInfo,
        controller: &ControllerConfig,
    ) -> P {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", session.remote_addr, e);
        }

        let (reader, writer) = stream.into_split();
        let mut dispatcher = Dispatcher::new(sensor, writer, controller.clone());

        match dispatcher.run(reader).await {
            Ok(()) => info!(
                "Host {} disconnected after {}s",
                session.remote_addr,
                session.uptime().num_seconds()
            ),
            Err(e) => error!("Session with {} ended: {}", session.remote_addr, e),
        }

        debug!("Reclaiming sensor from session {}", session.remote_addr);
        dispatcher.into_parts().0
    }
}
