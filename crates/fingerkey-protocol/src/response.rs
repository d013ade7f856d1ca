//! Outbound responses of the line protocol.
//!
//! A [`Response`] is built once per completed command and serialized
//! straight away:
//!
//! ```text
//! R,<tag>,<id>,<confidence>,<message>
//! ```
//!
//! The message is free text. To keep lines unambiguous it is escaped at the
//! boundary: `\` becomes `\\`, `,` becomes `\,`, and line breaks become `\n`
//! / `\r`. None of the fixed messages contain these characters, so their
//! lines are byte-identical to the unescaped form.

use fingerkey_core::constants::{
    ESCAPE_CHAR, FIELD_DELIMITER, MSG_READY, MSG_SYSTEM_READY, RESPONSE_FIELD_COUNT,
    RESPONSE_MARKER, TAG_FAILURE, TAG_INFO, TAG_READY, TAG_SUCCESS,
};
use fingerkey_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Kind of a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Success,
    Failure,
    Ready,
    /// Informational payload, used by count.
    Info,
}

impl ResponseKind {
    /// Wire tag character.
    pub fn tag(self) -> char {
        match self {
            Self::Success => TAG_SUCCESS,
            Self::Failure => TAG_FAILURE,
            Self::Ready => TAG_READY,
            Self::Info => TAG_INFO,
        }
    }

    /// Parse a wire tag character.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTag` for any character outside `S`, `F`, `Y`, `R`.
    pub fn from_tag(tag: char) -> Result<Self> {
        match tag {
            TAG_SUCCESS => Ok(Self::Success),
            TAG_FAILURE => Ok(Self::Failure),
            TAG_READY => Ok(Self::Ready),
            TAG_INFO => Ok(Self::Info),
            other => Err(Error::InvalidTag(other)),
        }
    }

    /// Terminal kinds close a command; Ready only announces the next one.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ready)
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Ready => "Ready",
            Self::Info => "Info",
        };
        write!(f, "{name}")
    }
}

/// A single protocol response.
///
/// Fields are private: a response is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    kind: ResponseKind,
    id: u16,
    confidence: u16,
    message: String,
}

impl Response {
    pub fn new(kind: ResponseKind, id: u16, confidence: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            confidence,
            message: message.into(),
        }
    }

    pub fn success(id: u16, confidence: u16, message: impl Into<String>) -> Self {
        Self::new(ResponseKind::Success, id, confidence, message)
    }

    /// Failure carrying an id. Confidence is always zero.
    pub fn failure(id: u16, message: impl Into<String>) -> Self {
        Self::new(ResponseKind::Failure, id, 0, message)
    }

    /// Info carrying a value in the id field.
    pub fn info(value: u16, message: impl Into<String>) -> Self {
        Self::new(ResponseKind::Info, value, 0, message)
    }

    pub fn ready(message: impl Into<String>) -> Self {
        Self::new(ResponseKind::Ready, 0, 0, message)
    }

    /// The Ready sent once when the controller starts.
    pub fn system_ready() -> Self {
        Self::ready(MSG_SYSTEM_READY)
    }

    /// The Ready sent after every command.
    pub fn next_ready() -> Self {
        Self::ready(MSG_READY)
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn confidence(&self) -> u16 {
        self.confidence
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_success(&self) -> bool {
        self.kind == ResponseKind::Success
    }

    /// Serialize to a wire line without terminator.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_protocol::Response;
    ///
    /// let response = Response::info(3, "Template count");
    /// assert_eq!(response.to_line(), "R,R,3,0,Template count");
    ///
    /// let response = Response::failure(0, "a, b");
    /// assert_eq!(response.to_line(), "R,F,0,0,a\\, b");
    /// ```
    pub fn to_line(&self) -> String {
        format!(
            "{RESPONSE_MARKER}{d}{}{d}{}{d}{}{d}{}",
            self.kind.tag(),
            self.id,
            self.confidence,
            escape_message(&self.message),
            d = FIELD_DELIMITER,
        )
    }

    /// Parse a wire line (terminator already stripped).
    ///
    /// Unescapes the message. A legacy line whose message contains bare
    /// commas is accepted: everything after the fourth delimiter is message.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker is missing, a field is missing, the
    /// tag is unknown, or id/confidence are not decimal numbers.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_protocol::{Response, ResponseKind};
    ///
    /// let response = Response::parse_line("R,S,5,87,Fingerprint matched").unwrap();
    /// assert_eq!(response.kind(), ResponseKind::Success);
    /// assert_eq!(response.id(), 5);
    /// assert_eq!(response.confidence(), 87);
    /// ```
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut fields = line.splitn(RESPONSE_FIELD_COUNT, FIELD_DELIMITER);

        let marker = fields.next().unwrap_or_default();
        if marker != RESPONSE_MARKER.to_string() {
            return Err(Error::InvalidMessageFormat(format!(
                "Response must start with {RESPONSE_MARKER}: {line}"
            )));
        }

        let tag = next_field(&mut fields, "tag")?;
        let mut tag_chars = tag.chars();
        let kind = match (tag_chars.next(), tag_chars.next()) {
            (Some(c), None) => ResponseKind::from_tag(c)?,
            _ => {
                return Err(Error::InvalidMessageFormat(format!(
                    "Tag must be one character: {tag}"
                )));
            }
        };

        let id = parse_number(next_field(&mut fields, "id")?, "id")?;
        let confidence = parse_number(next_field(&mut fields, "confidence")?, "confidence")?;
        let message = unescape_message(next_field(&mut fields, "message")?);

        Ok(Self {
            kind,
            id,
            confidence,
            message,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

fn next_field<'a>(fields: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<&'a str> {
    fields
        .next()
        .ok_or_else(|| Error::MissingField(name.to_string()))
}

fn parse_number(field: &str, name: &str) -> Result<u16> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::InvalidMessageFormat(format!("Invalid {name}: {field}")))
}

/// Escape a message for the wire.
///
/// Borrows when nothing needs escaping, which is the case for every fixed
/// message.
pub fn escape_message(message: &str) -> Cow<'_, str> {
    let needs_escape = message
        .chars()
        .any(|c| matches!(c, ESCAPE_CHAR | FIELD_DELIMITER | '\n' | '\r'));
    if !needs_escape {
        return Cow::Borrowed(message);
    }

    let mut escaped = String::with_capacity(message.len() + 8);
    for c in message.chars() {
        match c {
            ESCAPE_CHAR => escaped.push_str("\\\\"),
            FIELD_DELIMITER => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Reverse [`escape_message`]. Unknown escapes and a trailing lone `\` are
/// kept literally.
pub fn unescape_message(field: &str) -> String {
    let mut message = String::with_capacity(field.len());
    let mut chars = field.chars();

    while let Some(c) = chars.next() {
        if c != ESCAPE_CHAR {
            message.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => message.push('\n'),
            Some('r') => message.push('\r'),
            Some(ESCAPE_CHAR) => message.push(ESCAPE_CHAR),
            Some(FIELD_DELIMITER) => message.push(FIELD_DELIMITER),
            Some(other) => {
                message.push(ESCAPE_CHAR);
                message.push(other);
            }
            None => message.push(ESCAPE_CHAR),
        }
    }

    message
}
