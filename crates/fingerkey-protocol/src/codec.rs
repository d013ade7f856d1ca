//! Tokio codec for the newline-framed line protocol.
//!
//! `LineCodec` is used on both ends of the link:
//!
//! - the controller writes [`Response`] values through a `FramedWrite`
//! - the host writes [`Command`] values and reads [`DeviceLine`] values
//!   through a `Framed` stream
//!
//! ```text
//! host  --Command-->  "E5\n"                      --> controller
//! host  <--DeviceLine-- "R,S,5,0,Fingerprint ...\n" <-- controller
//! ```
//!
//! Controllers may print progress text between responses ("Place finger
//! to enroll..."). Such lines are surfaced as [`DeviceLine::Diagnostic`]
//! and never terminate a command.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use fingerkey_protocol::{Command, DeviceLine, LineCodec};
//!
//! # async fn example() -> fingerkey_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:7300").await?;
//! let mut framed = Framed::new(stream, LineCodec::new());
//!
//! framed.send(Command::count()).await?;
//! while let Some(line) = framed.next().await {
//!     if let DeviceLine::Response(response) = line? {
//!         println!("{response}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{BufMut, BytesMut};
use fingerkey_core::constants::{LINE_TERMINATOR, MAX_RESPONSE_LINE, RESPONSE_MARKER};
use fingerkey_core::{Error, Result};
use tokio_util::codec::{Decoder, Encoder};

use crate::{Command, Response};

/// One decoded line from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLine {
    /// A well-formed `R,...` response.
    Response(Response),

    /// Any other non-empty line. Logged by hosts, never acted upon.
    Diagnostic(String),
}

/// Newline-delimited codec with a line length limit.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Lines longer than this are rejected.
    max_line_length: usize,

    /// Bytes already scanned for a terminator in the current buffer.
    next_index: usize,
}

impl LineCodec {
    /// Create a codec with the default line limit (1 KB).
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_RESPONSE_LINE)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn classify(line: &str) -> DeviceLine {
        // Only lines carrying the response marker are candidates; a line that
        // has the marker but fails to parse is still reported, not dropped.
        let marked = line
            .strip_prefix(RESPONSE_MARKER)
            .is_some_and(|rest| rest.starts_with(','));
        if marked && let Ok(response) = Response::parse_line(line) {
            return DeviceLine::Response(response);
        }
        DeviceLine::Diagnostic(line.to_string())
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = DeviceLine;
    type Error = Error;

    /// Decode the next non-blank line.
    ///
    /// Trailing `\r` is stripped, so CRLF controllers decode the same as LF
    /// ones. Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns `Error::LineTooLong` when no terminator appears within
    /// `max_line_length` bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use tokio_util::codec::Decoder;
    /// use fingerkey_protocol::{DeviceLine, LineCodec};
    ///
    /// let mut codec = LineCodec::new();
    /// let mut buffer = BytesMut::from(&b"Place finger to verify...\r\nR,F,0,0,No match found\n"[..]);
    ///
    /// assert!(matches!(codec.decode(&mut buffer), Ok(Some(DeviceLine::Diagnostic(_)))));
    /// assert!(matches!(codec.decode(&mut buffer), Ok(Some(DeviceLine::Response(_)))));
    /// assert!(matches!(codec.decode(&mut buffer), Ok(None)));
    /// ```
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_line_length {
                    let size = src.len();
                    src.clear();
                    self.next_index = 0;
                    return Err(Error::LineTooLong {
                        size,
                        max_size: self.max_line_length,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;

            let raw = src.split_to(end + 1);
            let content = &raw[..end];
            if content.len() > self.max_line_length {
                return Err(Error::LineTooLong {
                    size: content.len(),
                    max_size: self.max_line_length,
                });
            }

            let text = String::from_utf8_lossy(content);
            let line = text.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            return Ok(Some(Self::classify(line)));
        }
    }
}

impl Encoder<Response> for LineCodec {
    type Error = Error;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<()> {
        let line = item.to_line();
        if line.len() > self.max_line_length {
            return Err(Error::LineTooLong {
                size: line.len(),
                max_size: self.max_line_length,
            });
        }
        dst.reserve(line.len() + LINE_TERMINATOR.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}

impl Encoder<Command> for LineCodec {
    type Error = Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        let wire = item.to_wire();
        dst.reserve(wire.len() + LINE_TERMINATOR.len());
        dst.put_slice(wire.as_bytes());
        dst.put_slice(LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}

impl Encoder<DeviceLine> for LineCodec {
    type Error = Error;

    /// Diagnostics are flattened to a single line so they can never split
    /// into something that looks like a response.
    fn encode(&mut self, item: DeviceLine, dst: &mut BytesMut) -> Result<()> {
        match item {
            DeviceLine::Response(response) => Encoder::<Response>::encode(self, response, dst),
            DeviceLine::Diagnostic(text) => {
                let line = text.replace(['\r', '\n'], " ");
                dst.reserve(line.len() + LINE_TERMINATOR.len());
                dst.put_slice(line.as_bytes());
                dst.put_slice(LINE_TERMINATOR.as_bytes());
                Ok(())
            }
        }
    }
}
