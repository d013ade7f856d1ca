//! Network transport for the fingerprint controller
//!
//! This crate carries the controller's line protocol over TCP. Both ends
//! use `LineCodec` for framing.
//!
//! # Components
//!
//! - **CommandServer**: serves one host session at a time through a
//!   `Dispatcher` that owns the sensor
//! - **HostClient**: sends commands and waits for the terminal response and
//!   the trailing Ready
//!
//! # Example
//!
//! ```no_run
//! use fingerkey_network::{HostClient, HostClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HostClientConfig::default().server_addr("127.0.0.1:7300".parse()?);
//!
//! let mut client = HostClient::new(config);
//! client.connect().await?;
//! let response = client.verify().await?;
//! println!("{response}");
//! # Ok(())
//! # }
//! ```

mod client;
mod server;

pub use client::{HostClient, HostClientConfig, HostClientError};
pub use server::{CommandServer, CommandServerConfig, CommandServerError, SessionInfo};
