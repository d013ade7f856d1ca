use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a single sensor capability call.
///
/// Every port operation maps the module's confirmation code onto one of
/// these. Which variants an operation can produce is fixed:
///
/// | Operation | Outcomes |
/// |-----------|----------|
/// | `capture_image` | `Ok`, `NoFingerPresent`, `ImageError` |
/// | `convert_image` | `Ok`, `ConversionError` |
/// | `create_model` | `Ok`, `ModelCreationError` |
/// | `store_model` | `Ok`, `StorageError` |
/// | `search_model` | `SearchMatch`, `SearchMiss` |
/// | `delete_model` | `DeletionOk`, `DeletionError` |
/// | `count_models` | `Count` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorOutcome {
    Ok,
    NoFingerPresent,
    ImageError,
    ConversionError,
    ModelCreationError,
    StorageError,
    SearchMiss,
    SearchMatch { id: u16, confidence: u16 },
    DeletionOk,
    DeletionError,
    Count(u16),
}

impl SensorOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for SensorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::NoFingerPresent => write!(f, "no finger present"),
            Self::ImageError => write!(f, "image error"),
            Self::ConversionError => write!(f, "conversion error"),
            Self::ModelCreationError => write!(f, "model creation error"),
            Self::StorageError => write!(f, "storage error"),
            Self::SearchMiss => write!(f, "search miss"),
            Self::SearchMatch { id, confidence } => {
                write!(f, "search match id={id} confidence={confidence}")
            }
            Self::DeletionOk => write!(f, "deletion ok"),
            Self::DeletionError => write!(f, "deletion error"),
            Self::Count(n) => write!(f, "count {n}"),
        }
    }
}

/// Feature buffer selector on the sensor module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharBuffer {
    One,
    Two,
}

impl CharBuffer {
    /// Buffer number as sent in the native protocol.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}
