//! Library half of the `fingerkey` binary: configuration, logging setup
//! and the host-side command flows.

pub mod commands;
pub mod config;
pub mod logger;

pub use commands::Host;
pub use config::{AppConfig, ConfigError, SensorBackend};
