pub mod access_log;
pub mod fingerprint;

pub use access_log::{AccessLog, AccessLogEntry, AccessStatus};
pub use fingerprint::Fingerprint;
