//! Line protocol between a host and the fingerprint controller.
//!
//! Commands travel host to controller as a single token plus an optional
//! decimal argument; responses travel back as comma-separated lines
//! prefixed with `R`. See [`command`] and [`response`] for the grammar and
//! [`codec`] for framing.

pub mod codec;
pub mod command;
pub mod response;

pub use codec::{DeviceLine, LineCodec};
pub use command::{Command, CommandTag};
pub use response::{Response, ResponseKind, escape_message, unescape_message};
