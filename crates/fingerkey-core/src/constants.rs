//! Core constants for the fingerprint line protocol.
//!
//! This module defines all protocol-level constants shared by the controller
//! (device side) and the host client. Keeping them in one place guarantees
//! both ends agree on tags, delimiters, fixed messages and timings.
//!
//! # Protocol Structure
//!
//! Commands travel host → controller as bare ASCII:
//!
//! ```text
//! E5        enroll into slot 5
//! V         verify
//! D12       delete slot 12
//! C         count stored templates
//! ```
//!
//! Responses travel controller → host as one line each:
//!
//! ```text
//! R,<tag>,<id>,<confidence>,<message>\n
//! ```
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `S` | Success |
//! | `F` | Failure |
//! | `Y` | Ready for next command |
//! | `R` | Info (template count) |
//!
//! The leading `R` is the response envelope marker. The Info tag happens to
//! use the same character; the two are kept as separate constants so code
//! never confuses one for the other.
//!
//! # Usage
//!
//! ```
//! use fingerkey_core::constants::*;
//!
//! assert_eq!(RESPONSE_MARKER, 'R');
//! assert_eq!(TAG_INFO, 'R');
//! assert!((MIN_SLOT_ID..=MAX_SLOT_ID).contains(&5));
//! ```

// ============================================================================
// Command Tokens
// ============================================================================

/// Enroll a new fingerprint. Followed by a slot id.
pub const CMD_ENROLL: char = 'E';

/// Verify a fingerprint against the stored library.
pub const CMD_VERIFY: char = 'V';

/// Delete a stored fingerprint. Followed by a slot id.
pub const CMD_DELETE: char = 'D';

/// Count stored templates.
pub const CMD_COUNT: char = 'C';

// ============================================================================
// Response Envelope
// ============================================================================

/// Leading marker of every response line.
///
/// Lines from the controller that do not start with this marker are
/// diagnostics and carry no protocol meaning.
pub const RESPONSE_MARKER: char = 'R';

/// Response tag for a successful command.
pub const TAG_SUCCESS: char = 'S';

/// Response tag for a failed command.
pub const TAG_FAILURE: char = 'F';

/// Response tag announcing readiness for the next command.
pub const TAG_READY: char = 'Y';

/// Response tag for informational payloads (template count).
///
/// Same character as [`RESPONSE_MARKER`], different meaning.
pub const TAG_INFO: char = 'R';

/// Field separator inside a response line.
///
/// # Examples
///
/// ```
/// use fingerkey_core::constants::FIELD_DELIMITER;
///
/// let line = "R,S,5,0,Fingerprint enrolled successfully";
/// let fields: Vec<&str> = line.splitn(5, FIELD_DELIMITER).collect();
/// assert_eq!(fields.len(), 5);
/// ```
pub const FIELD_DELIMITER: char = ',';

/// Escape character used inside the message field.
pub const ESCAPE_CHAR: char = '\\';

/// Line terminator for responses.
pub const LINE_TERMINATOR: &str = "\n";

/// Number of fields in a response line, marker included.
pub const RESPONSE_FIELD_COUNT: usize = 5;

/// Longest response line accepted by the host decoder (bytes).
pub const MAX_RESPONSE_LINE: usize = 1024;

// ============================================================================
// Slot Ids
// ============================================================================

/// Lowest slot id accepted for enroll/delete.
pub const MIN_SLOT_ID: u16 = 1;

/// Highest slot id accepted for enroll/delete.
pub const MAX_SLOT_ID: u16 = 127;

// ============================================================================
// Fixed Messages
// ============================================================================

/// Message of the Ready emitted once at startup.
pub const MSG_SYSTEM_READY: &str = "Fingerprint system ready";

/// Message of the Ready emitted after every command.
pub const MSG_READY: &str = "Ready for next command";

/// Failure message for a missing or out-of-range slot id.
pub const MSG_INVALID_ID: &str = "Invalid ID. Must be between 1-127";

/// Failure message for an unrecognised command token.
pub const MSG_UNKNOWN_COMMAND: &str = "Unknown command";

/// Success message for a completed enrollment.
pub const MSG_ENROLLED: &str = "Fingerprint enrolled successfully";

/// Enrollment failure while acquiring an image.
pub const MSG_IMAGE_ERROR: &str = "Error taking image";

/// Enrollment failure while converting an image to features.
pub const MSG_CONVERSION_ERROR: &str = "Error converting image";

/// Enrollment failure while combining features into a model.
pub const MSG_MODEL_ERROR: &str = "Error creating model";

/// Enrollment failure while writing the model to flash.
pub const MSG_STORAGE_ERROR: &str = "Error storing model";

/// Enrollment failure when a configured poll bound runs out.
pub const MSG_CAPTURE_TIMEOUT: &str = "Timed out waiting for finger";

/// Success message for a verify that found a match.
pub const MSG_MATCHED: &str = "Fingerprint matched";

/// Failure message for every unsuccessful verify.
pub const MSG_NO_MATCH: &str = "No match found";

/// Message of the Info response to a count.
pub const MSG_TEMPLATE_COUNT: &str = "Template count";

/// Prefix of the delete success message, followed by the slot id.
pub const MSG_DELETED_PREFIX: &str = "Deleted fingerprint ID #";

/// Prefix of the delete failure message, followed by the slot id.
pub const MSG_DELETE_FAILED_PREFIX: &str = "Failed to delete fingerprint ID #";

// ============================================================================
// Timing
// ============================================================================

/// Delay between capture polls while waiting for a finger (milliseconds).
pub const DEFAULT_CAPTURE_POLL_INTERVAL_MS: u64 = 500;

/// Delay before polling for finger removal during enrollment (milliseconds).
pub const DEFAULT_REMOVAL_SETTLE_MS: u64 = 2000;

/// How long the dispatcher waits for an enroll/delete argument (milliseconds).
///
/// The host may send `E` and `5` as two separate writes.
pub const DEFAULT_ARGUMENT_WAIT_MS: u64 = 100;

/// Default time the host waits for a terminal response (milliseconds).
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

/// Default time the host waits for an enrollment to finish (milliseconds).
///
/// Enrollment blocks on a person placing, lifting and placing a finger.
pub const DEFAULT_ENROLL_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// Serial Links
// ============================================================================

/// Baud rate of the sensor module's UART.
pub const DEFAULT_SENSOR_BAUD_RATE: u32 = 57_600;

/// Default password of the sensor module.
pub const DEFAULT_SENSOR_PASSWORD: u32 = 0;

/// Default module address (broadcast).
pub const DEFAULT_SENSOR_ADDRESS: u32 = 0xFFFF_FFFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_distinct() {
        let tags = [TAG_SUCCESS, TAG_FAILURE, TAG_READY, TAG_INFO];
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_fixed_messages_need_no_escaping() {
        let messages = [
            MSG_SYSTEM_READY,
            MSG_READY,
            MSG_INVALID_ID,
            MSG_UNKNOWN_COMMAND,
            MSG_ENROLLED,
            MSG_IMAGE_ERROR,
            MSG_CONVERSION_ERROR,
            MSG_MODEL_ERROR,
            MSG_STORAGE_ERROR,
            MSG_CAPTURE_TIMEOUT,
            MSG_MATCHED,
            MSG_NO_MATCH,
            MSG_TEMPLATE_COUNT,
            MSG_DELETED_PREFIX,
            MSG_DELETE_FAILED_PREFIX,
        ];

        for message in messages {
            assert!(!message.contains(FIELD_DELIMITER), "{message}");
            assert!(!message.contains(ESCAPE_CHAR), "{message}");
            assert!(!message.contains('\n'), "{message}");
        }
    }

    #[test]
    fn test_slot_range() {
        assert!(MIN_SLOT_ID < MAX_SLOT_ID);
        assert_eq!(MAX_SLOT_ID, 127);
    }
}
