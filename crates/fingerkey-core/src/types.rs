use crate::{
    Result,
    constants::{MAX_SLOT_ID, MIN_SLOT_ID},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template slot identifier (1-127).
///
/// Addresses a template inside the sensor module's flash library. The
/// sensor enforces uniqueness; this type only enforces the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct SlotId(u16);

impl SlotId {
    /// Create a new slot id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlotId` if the id is outside 1-127.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_core::SlotId;
    ///
    /// assert_eq!(SlotId::new(5).unwrap().as_u16(), 5);
    /// assert!(SlotId::new(0).is_err());
    /// assert!(SlotId::new(128).is_err());
    /// ```
    pub fn new(id: u16) -> Result<Self> {
        Self::try_from(i64::from(id))
    }

    /// Get the raw slot number.
    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for SlotId {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        if !(i64::from(MIN_SLOT_ID)..=i64::from(MAX_SLOT_ID)).contains(&value) {
            return Err(Error::InvalidSlotId {
                value,
                min: MIN_SLOT_ID,
                max: MAX_SLOT_ID,
            });
        }
        // Range-checked above, fits in u16.
        Ok(SlotId(value as u16))
    }
}

impl From<SlotId> for u16 {
    fn from(id: SlotId) -> Self {
        id.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SlotId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidMessageFormat(format!("Invalid slot id: {s}")))?;
        SlotId::try_from(value)
    }
}
