//! Error types for sensor operations.
//!
//! These errors describe failures of the link to the sensor module, not
//! biometric outcomes. A finger that does not match, or an image that is
//! too blurry, is a [`SensorOutcome`](crate::SensorOutcome); a checksum
//! mismatch or a closed serial port is a [`SensorError`].

/// Result type alias for sensor operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Errors that can occur while talking to the sensor module.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// Sensor is not connected or has been disconnected.
    #[error("Sensor disconnected: {device}")]
    Disconnected { device: String },

    /// No acknowledgement arrived in time.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Handshake failed at startup.
    #[error("Sensor not detected: {message}")]
    NotDetected { message: String },

    /// Packet checksum did not match its contents.
    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Packet structure was invalid.
    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    /// Serial port configuration or open failure.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SensorError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn not_detected(message: impl Into<String>) -> Self {
        Self::NotDetected {
            message: message.into(),
        }
    }

    pub fn checksum_mismatch(expected: u16, actual: u16) -> Self {
        Self::ChecksumMismatch { expected, actual }
    }

    pub fn invalid_packet(message: impl Into<String>) -> Self {
        Self::InvalidPacket {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<serialport::Error> for SensorError {
    fn from(error: serialport::Error) -> Self {
        match error.kind() {
            serialport::ErrorKind::NoDevice => Self::disconnected(error.description),
            serialport::ErrorKind::Io(kind) => Self::Io(std::io::Error::new(kind, error.description)),
            _ => Self::configuration(error.description),
        }
    }
}
