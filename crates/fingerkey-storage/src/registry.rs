//! Host-side bookkeeping of command outcomes.
//!
//! The sensor holds templates; the registry holds who they belong to and
//! when they were used. Each method takes the controller's terminal
//! response and records only what a successful (or, for verify, failed)
//! outcome implies.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fingerkey_core::SlotId;
use fingerkey_protocol::Response;

use crate::connection::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::{AccessLog, AccessLogEntry, AccessStatus, Fingerprint};
use crate::repositories::{
    AccessLogRepository, FingerprintRepository, SqliteAccessLogRepository,
    SqliteFingerprintRepository,
};
use crate::transaction;

/// Number of log entries shown when no limit is given.
pub const DEFAULT_LOG_LIMIT: i64 = 20;

/// Name reported for slots without a registered identity.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A successful verify resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub id: u16,
    pub name: String,
    pub confidence: u16,
}

/// Records enroll, verify and delete outcomes.
///
/// # Examples
///
/// ```no_run
/// use fingerkey_core::SlotId;
/// use fingerkey_protocol::Response;
/// use fingerkey_storage::{Database, Registry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Registry::new(Database::in_memory().await?);
/// let slot = SlotId::new(5)?;
///
/// let enrolled = Response::success(5, 0, "Fingerprint enrolled successfully");
/// registry.record_enrollment(slot, "Ada", &enrolled).await?;
///
/// let matched = Response::success(5, 120, "Fingerprint matched");
/// let identity = registry.record_verification(&matched).await?.unwrap();
/// assert_eq!(identity.name, "Ada");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    db: Database,
}

impl Registry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn fingerprints(&self) -> SqliteFingerprintRepository {
        SqliteFingerprintRepository::new(self.db.pool().clone())
    }

    fn logs(&self) -> SqliteAccessLogRepository {
        SqliteAccessLogRepository::new(self.db.pool().clone())
    }

    /// Trimmed display name, rejected when empty.
    ///
    /// Check before asking the sensor to enroll so a bad name does not leave
    /// an anonymous template behind.
    pub fn validate_name(name: &str) -> StorageResult<&str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::Validation(
                "Name must not be empty".to_string(),
            ));
        }
        Ok(name)
    }

    /// Register `name` for `slot` if the enroll succeeded.
    ///
    /// Returns the stored identity, or `None` when the response was a
    /// failure. An existing identity in the same slot is replaced.
    pub async fn record_enrollment(
        &self,
        slot: SlotId,
        name: &str,
        response: &Response,
    ) -> StorageResult<Option<Fingerprint>> {
        if !response.is_success() {
            debug!("Enroll of slot {} failed, nothing to record", slot);
            return Ok(None);
        }
        if response.id() != slot.as_u16() {
            warn!(
                "Enroll response names slot {} but slot {} was requested",
                response.id(),
                slot
            );
        }

        let fingerprint = Fingerprint::enrolled(slot, Self::validate_name(name)?);
        self.fingerprints().upsert(&fingerprint).await?;
        info!("Registered '{}' in slot {}", fingerprint.name, slot);
        Ok(Some(fingerprint))
    }

    /// Log a verify attempt.
    ///
    /// A match updates `last_access` and logs `ACCESS_GRANTED`; anything
    /// else logs `ACCESS_DENIED` with no identity and returns `None`. A match
    /// on a slot with no registered identity is granted with no reference.
    pub async fn record_verification(
        &self,
        response: &Response,
    ) -> StorageResult<Option<VerifiedIdentity>> {
        if !response.is_success() {
            self.logs().create(&AccessLog::denied()).await?;
            info!("Access denied: {}", response.message());
            return Ok(None);
        }

        let id = response.id();
        let confidence = response.confidence();
        let now = Utc::now();

        let mut tx = self.db.pool().begin().await?;
        let known = transaction::touch_last_access(&mut tx, i64::from(id), now).await?;
        let log = AccessLog::new(
            known.then_some(i64::from(id)),
            i64::from(confidence),
            AccessStatus::Granted,
        );
        transaction::insert_access_log(&mut tx, &log.at(now)).await?;
        tx.commit().await?;

        let name = if known {
            self.fingerprints()
                .find_by_id(i64::from(id))
                .await?
                .map(|f| f.name)
                .unwrap_or_else(|| UNKNOWN_NAME.to_string())
        } else {
            warn!("Slot {} matched but has no registered identity", id);
            UNKNOWN_NAME.to_string()
        };

        info!("Access granted to '{}' (slot {}, confidence {})", name, id, confidence);
        Ok(Some(VerifiedIdentity {
            id,
            name,
            confidence,
        }))
    }

    /// Log and remove the identity in `slot` if the delete succeeded.
    ///
    /// Returns whether a registered identity was removed. A successful
    /// delete of an unregistered slot is still logged.
    ///
    /// Removing the identity clears its log references, this `DELETED`
    /// entry included, so a later enrollment in the slot starts with no
    /// history.
    pub async fn record_deletion(&self, slot: SlotId, response: &Response) -> StorageResult<bool> {
        if !response.is_success() {
            debug!("Delete of slot {} failed, nothing to record", slot);
            return Ok(false);
        }

        let id = i64::from(slot.as_u16());
        let mut tx = self.db.pool().begin().await?;
        let log = if transaction::fingerprint_exists(&mut tx, id).await? {
            AccessLog::deleted(id)
        } else {
            AccessLog::new(None, 0, AccessStatus::Deleted)
        };
        transaction::insert_access_log(&mut tx, &log).await?;
        let removed = transaction::delete_fingerprint(&mut tx, id).await?;
        tx.commit().await?;

        info!("Deleted slot {} (registered: {})", slot, removed);
        Ok(removed)
    }

    /// Look up one identity.
    pub async fn fingerprint(&self, slot: SlotId) -> StorageResult<Fingerprint> {
        self.fingerprints()
            .find_by_id(i64::from(slot.as_u16()))
            .await?
            .ok_or_else(|| StorageError::fingerprint_not_found(slot.as_u16()))
    }

    /// All identities ordered by slot.
    pub async fn list_fingerprints(&self) -> StorageResult<Vec<Fingerprint>> {
        self.fingerprints().find_all().await
    }

    /// Newest log entries first, at most `limit`.
    pub async fn recent_logs(&self, limit: i64) -> StorageResult<Vec<AccessLogEntry>> {
        if limit <= 0 {
            return Err(StorageError::Validation(format!(
                "Log limit must be positive, got {limit}"
            )));
        }
        self.logs().find_recent(limit).await
    }
}
