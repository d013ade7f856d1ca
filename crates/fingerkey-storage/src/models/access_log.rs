use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// Outcome recorded in an access log entry.
///
/// Stored as text (`ACCESS_GRANTED`, `ACCESS_DENIED`, `DELETED`).
///
/// ```
/// use fingerkey_storage::models::AccessStatus;
///
/// assert_eq!(AccessStatus::Granted.as_str(), "ACCESS_GRANTED");
/// assert_eq!("DELETED".parse::<AccessStatus>().unwrap(), AccessStatus::Deleted);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    #[serde(rename = "ACCESS_GRANTED")]
    #[sqlx(rename = "ACCESS_GRANTED")]
    Granted,

    #[serde(rename = "ACCESS_DENIED")]
    #[sqlx(rename = "ACCESS_DENIED")]
    Denied,

    Deleted,
}

impl AccessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "ACCESS_GRANTED",
            Self::Denied => "ACCESS_DENIED",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCESS_GRANTED" => Ok(Self::Granted),
            "ACCESS_DENIED" => Ok(Self::Denied),
            "DELETED" => Ok(Self::Deleted),
            other => Err(StorageError::Validation(format!(
                "Unknown access status: {other}"
            ))),
        }
    }
}

/// One row of `access_logs`.
///
/// `fingerprint_id` references the matched identity. It is `None` when no
/// registered identity is involved, or once that identity is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLog {
    /// Assigned by the database; ignored on insert
    pub log_id: i64,

    pub fingerprint_id: Option<i64>,

    pub timestamp: DateTime<Utc>,

    pub confidence: i64,

    pub status: AccessStatus,
}

impl AccessLog {
    pub fn new(fingerprint_id: Option<i64>, confidence: i64, status: AccessStatus) -> Self {
        Self {
            log_id: 0,
            fingerprint_id,
            timestamp: Utc::now(),
            confidence,
            status,
        }
    }

    pub fn granted(fingerprint_id: i64, confidence: i64) -> Self {
        Self::new(Some(fingerprint_id), confidence, AccessStatus::Granted)
    }

    pub fn denied() -> Self {
        Self::new(None, 0, AccessStatus::Denied)
    }

    pub fn deleted(fingerprint_id: i64) -> Self {
        Self::new(Some(fingerprint_id), 0, AccessStatus::Deleted)
    }

    /// Same entry with an explicit event time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// An access log row joined with the identity's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLogEntry {
    pub log_id: i64,
    pub fingerprint_id: Option<i64>,
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub confidence: i64,
    pub status: AccessStatus,
}

impl AccessLogEntry {
    /// Name to show, "Unknown" when the identity is missing.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AccessStatus::Granted, "ACCESS_GRANTED")]
    #[case(AccessStatus::Denied, "ACCESS_DENIED")]
    #[case(AccessStatus::Deleted, "DELETED")]
    fn test_status_text(#[case] status: AccessStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(status.to_string(), text);
        assert_eq!(text.parse::<AccessStatus>().unwrap(), status);
    }

    #[test]
    fn test_unknown_status() {
        assert!("GRANTED".parse::<AccessStatus>().is_err());
    }

    #[test]
    fn test_constructors() {
        let denied = AccessLog::denied();
        assert_eq!(denied.fingerprint_id, None);
        assert_eq!(denied.confidence, 0);
        assert_eq!(denied.status, AccessStatus::Denied);

        let granted = AccessLog::granted(5, 93);
        assert_eq!(granted.fingerprint_id, Some(5));
        assert_eq!(granted.confidence, 93);
    }

    #[test]
    fn test_display_name() {
        let entry = AccessLogEntry {
            log_id: 1,
            fingerprint_id: None,
            name: None,
            timestamp: Utc::now(),
            confidence: 0,
            status: AccessStatus::Denied,
        };
        assert_eq!(entry.display_name(), "Unknown");
    }
}
