//! Host-side registry for the fingerprint controller.
//!
//! The sensor only knows slot numbers. This crate keeps the mapping from
//! slot to person and an audit trail of verify and delete outcomes in
//! SQLite.
//!
//! # Architecture
//!
//! - [`Database`] - connection pool with embedded migrations
//! - [`FingerprintRepository`], [`AccessLogRepository`] - data access traits
//! - [`transaction`] - writes that must commit together
//! - [`Registry`] - turns controller responses into registry updates
//!
//! # Examples
//!
//! ```no_run
//! use fingerkey_storage::{Database, DatabaseConfig, Registry, DEFAULT_LOG_LIMIT};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("fingerkey.db")).await?;
//! let registry = Registry::new(db);
//!
//! for fingerprint in registry.list_fingerprints().await? {
//!     println!("{:>3}  {}", fingerprint.id, fingerprint.name);
//! }
//! for entry in registry.recent_logs(DEFAULT_LOG_LIMIT).await? {
//!     println!("{}  {}  {}", entry.timestamp, entry.display_name(), entry.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! All queries are parameterized. Timestamps are stored as RFC 3339 text in
//! UTC.

pub mod connection;
pub mod error;
pub mod models;
pub mod registry;
pub mod repositories;
pub mod transaction;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::{AccessLog, AccessLogEntry, AccessStatus, Fingerprint};
pub use registry::{DEFAULT_LOG_LIMIT, Registry, UNKNOWN_NAME, VerifiedIdentity};
pub use repositories::{
    AccessLogRepository, FingerprintRepository, SqliteAccessLogRepository,
    SqliteFingerprintRepository,
};
