//! Inbound commands of the line protocol.
//!
//! A command is a single ASCII token optionally followed by a decimal
//! argument:
//!
//! ```text
//! E5    Enroll into slot 5
//! V     Verify
//! D12   Delete slot 12
//! C     Count
//! ```
//!
//! Parsing is lenient in the same way a microcontroller's stream-integer
//! reader is: characters before the first digit are skipped, a `-` directly
//! before the digits is kept as a sign, and reading stops at the first
//! non-digit. Range checking is deliberately separate ([`Command::slot`]) so
//! the dispatcher can report an out-of-range id without touching the sensor.

use fingerkey_core::constants::{CMD_COUNT, CMD_DELETE, CMD_ENROLL, CMD_VERIFY};
use fingerkey_core::{Error, Result, SlotId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command token received from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandTag {
    /// `E` - enroll a new fingerprint.
    Enroll,

    /// `V` - verify a presented fingerprint.
    Verify,

    /// `D` - delete a stored fingerprint.
    Delete,

    /// `C` - count stored templates.
    Count,

    /// Any other token.
    Unknown(char),
}

impl CommandTag {
    /// Classify a token character. Tokens are case sensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_protocol::CommandTag;
    ///
    /// assert_eq!(CommandTag::from_token('E'), CommandTag::Enroll);
    /// assert_eq!(CommandTag::from_token('e'), CommandTag::Unknown('e'));
    /// ```
    pub fn from_token(token: char) -> Self {
        match token {
            CMD_ENROLL => Self::Enroll,
            CMD_VERIFY => Self::Verify,
            CMD_DELETE => Self::Delete,
            CMD_COUNT => Self::Count,
            other => Self::Unknown(other),
        }
    }

    /// The token character for this tag.
    pub fn token(&self) -> char {
        match self {
            Self::Enroll => CMD_ENROLL,
            Self::Verify => CMD_VERIFY,
            Self::Delete => CMD_DELETE,
            Self::Count => CMD_COUNT,
            Self::Unknown(c) => *c,
        }
    }

    /// Whether this command expects a slot id argument.
    pub fn takes_argument(&self) -> bool {
        matches!(self, Self::Enroll | Self::Delete)
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enroll => write!(f, "Enroll"),
            Self::Verify => write!(f, "Verify"),
            Self::Delete => write!(f, "Delete"),
            Self::Count => write!(f, "Count"),
            Self::Unknown(c) => write!(f, "Unknown({c:?})"),
        }
    }
}

/// A parsed command with its raw, unvalidated argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub tag: CommandTag,
    pub argument: Option<i64>,
}

impl Command {
    pub fn new(tag: CommandTag, argument: Option<i64>) -> Self {
        Self { tag, argument }
    }

    /// Build an enroll command for the host side.
    pub fn enroll(slot: SlotId) -> Self {
        Self::new(CommandTag::Enroll, Some(i64::from(slot.as_u16())))
    }

    /// Build a verify command for the host side.
    pub fn verify() -> Self {
        Self::new(CommandTag::Verify, None)
    }

    /// Build a delete command for the host side.
    pub fn delete(slot: SlotId) -> Self {
        Self::new(CommandTag::Delete, Some(i64::from(slot.as_u16())))
    }

    /// Build a count command for the host side.
    pub fn count() -> Self {
        Self::new(CommandTag::Count, None)
    }

    /// Parse a complete command line.
    ///
    /// Leading whitespace is skipped. Returns `None` for a blank line.
    /// Arguments are only read for tags that take one.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_protocol::{Command, CommandTag};
    ///
    /// let cmd = Command::parse("E5").unwrap();
    /// assert_eq!(cmd.tag, CommandTag::Enroll);
    /// assert_eq!(cmd.argument, Some(5));
    ///
    /// let cmd = Command::parse("V7").unwrap();
    /// assert_eq!(cmd.argument, None);
    ///
    /// assert!(Command::parse("   ").is_none());
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        let token = trimmed.chars().next()?;
        let tag = CommandTag::from_token(token);

        let argument = if tag.takes_argument() {
            parse_integer(&trimmed[token.len_utf8()..]).map(|(value, _)| value)
        } else {
            None
        };

        Some(Self { tag, argument })
    }

    /// Validate the argument as a slot id.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingField` when no argument was supplied and
    /// `Error::InvalidSlotId` when it is outside 1-127.
    pub fn slot(&self) -> Result<SlotId> {
        let value = self
            .argument
            .ok_or_else(|| Error::MissingField("slot id".to_string()))?;
        SlotId::try_from(value)
    }

    /// Wire form sent by the host, without line terminator.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_core::SlotId;
    /// use fingerkey_protocol::Command;
    ///
    /// let slot = SlotId::new(12).unwrap();
    /// assert_eq!(Command::delete(slot).to_wire(), "D12");
    /// assert_eq!(Command::count().to_wire(), "C");
    /// ```
    pub fn to_wire(&self) -> String {
        match self.argument {
            Some(value) if self.tag.takes_argument() => format!("{}{}", self.tag.token(), value),
            _ => self.tag.token().to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument {
            Some(value) => write!(f, "{}({})", self.tag, value),
            None => write!(f, "{}", self.tag),
        }
    }
}

/// Read a decimal integer the way a serial stream reader does.
///
/// Skips every character that cannot start a number, accepts one `-`
/// directly before the digits, and stops at the first non-digit after them.
/// Returns the value and the number of bytes consumed, or `None` when the
/// input holds no digits. Values too large for `i64` saturate.
///
/// # Examples
///
/// ```
/// use fingerkey_protocol::command::parse_integer;
///
/// assert_eq!(parse_integer("5"), Some((5, 1)));
/// assert_eq!(parse_integer(" 42\n"), Some((42, 3)));
/// assert_eq!(parse_integer("x-3y"), Some((-3, 3)));
/// assert_eq!(parse_integer("abc"), None);
/// ```
pub fn parse_integer(input: &str) -> Option<(i64, usize)> {
    let bytes = input.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;

    let negative = start > 0 && bytes[start - 1] == b'-';
    let mut value: i64 = 0;
    let mut end = start;

    while end < bytes.len() && bytes[end].is_ascii_digit() {
        let digit = i64::from(bytes[end] - b'0');
        value = value.saturating_mul(10).saturating_add(digit);
        end += 1;
    }

    Some((if negative { -value } else { value }, end))
}
