//! Types shared by every fingerkey crate: the sensor slot number, the
//! protocol and sensor constants, and the common error type.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
