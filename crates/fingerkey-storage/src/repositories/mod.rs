pub mod access_log;
pub mod fingerprint;

pub use access_log::{AccessLogRepository, SqliteAccessLogRepository};
pub use fingerprint::{FingerprintRepository, SqliteFingerprintRepository};
