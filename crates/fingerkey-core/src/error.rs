use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Invalid response tag: {0:?}")]
    InvalidTag(char),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Response line too long: {size} bytes (max {max_size})")]
    LineTooLong { size: usize, max_size: usize },

    // Validation errors
    #[error("Invalid slot id {value}: must be between {min}-{max}")]
    InvalidSlotId { value: i64, min: u16, max: u16 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
