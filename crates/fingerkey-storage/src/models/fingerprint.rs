use chrono::{DateTime, Utc};
use fingerkey_core::SlotId;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// An enrolled identity.
///
/// `id` is the sensor slot that holds the template, so there is at most one
/// identity per slot.
///
/// # Examples
///
/// ```
/// use fingerkey_core::SlotId;
/// use fingerkey_storage::models::Fingerprint;
///
/// let fingerprint = Fingerprint::enrolled(SlotId::new(5).unwrap(), "Ada");
/// assert_eq!(fingerprint.id, 5);
/// assert_eq!(fingerprint.last_access, Some(fingerprint.registration_date));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Fingerprint {
    /// Sensor slot (1-127)
    pub id: i64,

    /// Display name given at enrollment
    pub name: String,

    pub registration_date: DateTime<Utc>,

    /// Last successful verify. Set to the registration time on enrollment.
    pub last_access: Option<DateTime<Utc>>,
}

impl Fingerprint {
    /// A freshly enrolled identity, registered and last seen now.
    pub fn enrolled(slot: SlotId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: i64::from(slot.as_u16()),
            name: name.into(),
            registration_date: now,
            last_access: Some(now),
        }
    }

    pub fn slot(&self) -> StorageResult<SlotId> {
        SlotId::try_from(self.id).map_err(|e| StorageError::Validation(e.to_string()))
    }
}
