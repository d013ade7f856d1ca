//! Command tokenizer over the inbound byte stream.
//!
//! Hosts are not required to send a command as one write: `E` and `5` may
//! arrive separately. After reading an `E` or `D` token the reader waits a
//! bounded time for the digits, then hands the command to the dispatcher.
//! Whitespace and line terminators before a command are skipped. Once a
//! command has been handled, every byte already received is discarded, so
//! input sent while the controller was busy never becomes a command.

use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::trace;

use fingerkey_protocol::command::parse_integer;
use fingerkey_protocol::{Command, CommandTag};

const READ_CHUNK: usize = 64;

/// Reads [`Command`] values from the host link.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fingerkey_controller::CommandReader;
/// use fingerkey_protocol::Command;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let mut reader = CommandReader::new(&b"V\nC\n"[..], Duration::from_millis(100));
///
/// assert_eq!(reader.next_command().await?, Some(Command::verify()));
/// // The C arrived before V was handled, so it is dropped with the newlines.
/// assert_eq!(reader.discard_pending()?, 3);
/// assert_eq!(reader.next_command().await?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CommandReader<R> {
    inner: R,
    buffer: BytesMut,
    argument_wait: Duration,
    eof: bool,
}

impl<R: AsyncRead + Unpin> CommandReader<R> {
    pub fn new(inner: R, argument_wait: Duration) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            argument_wait,
            eof: false,
        }
    }

    /// Read the next command.
    ///
    /// Returns `Ok(None)` once the stream has ended and nothing is buffered.
    pub async fn next_command(&mut self) -> io::Result<Option<Command>> {
        loop {
            let skip = self
                .buffer
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            self.buffer.advance(skip);

            if !self.buffer.is_empty() {
                break;
            }
            if self.eof || self.fill().await? == 0 {
                return Ok(None);
            }
        }

        let token = char::from(self.buffer[0]);
        self.buffer.advance(1);
        let tag = CommandTag::from_token(token);

        let argument = if tag.takes_argument() {
            self.read_argument().await?
        } else {
            None
        };

        let command = Command::new(tag, argument);
        trace!("Read command {}", command);
        Ok(Some(command))
    }

    /// Drop everything buffered plus everything the link can deliver
    /// without waiting. Returns the number of bytes dropped.
    ///
    /// Called after each command so nothing sent while it ran is taken as
    /// the next command.
    pub fn discard_pending(&mut self) -> io::Result<usize> {
        let mut dropped = self.buffer.len();
        self.buffer.clear();

        while !self.eof {
            self.buffer.reserve(READ_CHUNK);
            match self.inner.read_buf(&mut self.buffer).now_or_never() {
                Some(Ok(0)) => self.eof = true,
                Some(Ok(read)) => {
                    dropped += read;
                    self.buffer.clear();
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        if dropped > 0 {
            trace!("Discarded {} pending bytes", dropped);
        }
        Ok(dropped)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Wait up to `argument_wait` for a number on the current line.
    ///
    /// Digits at the end of the buffer may still be growing, so they are
    /// only accepted once followed by something else or once the wait ends.
    async fn read_argument(&mut self) -> io::Result<Option<i64>> {
        let deadline = Instant::now() + self.argument_wait;

        loop {
            let (parsed, terminated) = self.scan_argument();
            match parsed {
                Some((value, complete)) if complete || terminated => return Ok(Some(value)),
                None if terminated => return Ok(None),
                _ => {}
            }

            if self.eof {
                return Ok(parsed.map(|(value, _)| value));
            }

            match tokio::time::timeout_at(deadline, self.fill()).await {
                Ok(result) => {
                    result?;
                }
                Err(_) => {
                    trace!("Argument wait ended");
                    return Ok(self.scan_argument().0.map(|(value, _)| value));
                }
            }
        }
    }

    /// Parse a number from the buffered part of the current line.
    ///
    /// Returns the value with whether a non-digit follows it, and whether
    /// the line terminator has been buffered.
    fn scan_argument(&self) -> (Option<(i64, bool)>, bool) {
        let line_end = self.buffer.iter().position(|b| *b == b'\n');
        let line = String::from_utf8_lossy(&self.buffer[..line_end.unwrap_or(self.buffer.len())]);
        let parsed = parse_integer(&line).map(|(value, end)| (value, end < line.len()));
        (parsed, line_end.is_some())
    }

    async fn fill(&mut self) -> io::Result<usize> {
        self.buffer.reserve(READ_CHUNK);
        let read = self.inner.read_buf(&mut self.buffer).await?;
        if read == 0 {
            self.eof = true;
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::io::AsyncWriteExt;

    const WAIT: Duration = Duration::from_millis(100);

    async fn read_all(input: &[u8]) -> Vec<Command> {
        let mut reader = CommandReader::new(input, WAIT);
        let mut commands = Vec::new();
        while let Some(command) = reader.next_command().await.unwrap() {
            commands.push(command);
            reader.discard_pending().unwrap();
        }
        commands
    }

    #[rstest]
    #[case(b"E5\n", CommandTag::Enroll, Some(5))]
    #[case(b"D12\r\n", CommandTag::Delete, Some(12))]
    #[case(b"E 7\n", CommandTag::Enroll, Some(7))]
    #[case(b"D-3\n", CommandTag::Delete, Some(-3))]
    #[case(b"E200\n", CommandTag::Enroll, Some(200))]
    #[case(b"E\n", CommandTag::Enroll, None)]
    #[case(b"Dx\n", CommandTag::Delete, None)]
    #[case(b"V9\n", CommandTag::Verify, None)]
    #[case(b"Z\n", CommandTag::Unknown('Z'), None)]
    #[tokio::test]
    async fn test_single_command(
        #[case] input: &[u8],
        #[case] tag: CommandTag,
        #[case] argument: Option<i64>,
    ) {
        assert_eq!(read_all(input).await, vec![Command::new(tag, argument)]);
    }

    #[tokio::test]
    async fn test_skips_blank_lines() {
        assert_eq!(read_all(b"\r\n\n  C\n").await, vec![Command::count()]);
    }

    #[rstest]
    #[case(b"E5\nC\n", Command::new(CommandTag::Enroll, Some(5)))]
    #[case(b"VC\n", Command::verify())]
    #[case(b"D3\nD4\nD5\n", Command::new(CommandTag::Delete, Some(3)))]
    #[tokio::test]
    async fn test_input_behind_command_discarded(#[case] input: &[u8], #[case] first: Command) {
        assert_eq!(read_all(input).await, vec![first]);
    }

    #[tokio::test]
    async fn test_commands_in_separate_writes() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut reader = CommandReader::new(device, WAIT);
        let mut commands = Vec::new();

        for line in [&b"VC\n"[..], b"\r\nE5 junk\n", b"\nC\n"] {
            host.write_all(line).await.unwrap();
            commands.push(reader.next_command().await.unwrap().unwrap());
            reader.discard_pending().unwrap();
        }

        assert_eq!(
            commands,
            vec![
                Command::verify(),
                Command::new(CommandTag::Enroll, Some(5)),
                Command::count(),
            ]
        );
    }

    #[tokio::test]
    async fn test_discard_drains_unread_input() {
        let (mut host, device) = tokio::io::duplex(1024);
        let mut reader = CommandReader::new(device, WAIT);

        host.write_all(b"C\n").await.unwrap();
        assert_eq!(reader.next_command().await.unwrap(), Some(Command::count()));

        // More than one read chunk arrives while the command runs.
        host.write_all(&[b'V'; 200]).await.unwrap();
        assert_eq!(reader.discard_pending().unwrap(), 201);
        assert_eq!(reader.discard_pending().unwrap(), 0);

        host.write_all(b"V\n").await.unwrap();
        drop(host);
        assert_eq!(reader.next_command().await.unwrap(), Some(Command::verify()));
        reader.discard_pending().unwrap();
        assert_eq!(reader.next_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_argument_at_end_of_stream() {
        assert_eq!(read_all(b"D42").await, vec![Command::new(CommandTag::Delete, Some(42))]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(read_all(b"").await.is_empty());
        assert!(read_all(b" \r\n").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_argument_in_second_write() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut reader = CommandReader::new(device, WAIT);

        let writer = async {
            host.write_all(b"E").await.unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
            host.write_all(b"5\n").await.unwrap();
            host
        };
        let (command, _host) = tokio::join!(reader.next_command(), writer);

        assert_eq!(command.unwrap(), Some(Command::new(CommandTag::Enroll, Some(5))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_argument_wait_expires() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut reader = CommandReader::new(device, WAIT);

        host.write_all(b"D").await.unwrap();
        let started = Instant::now();
        let command = reader.next_command().await.unwrap();

        assert_eq!(command, Some(Command::new(CommandTag::Delete, None)));
        assert_eq!(started.elapsed(), WAIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unterminated_digits_accepted_after_wait() {
        let (mut host, device) = tokio::io::duplex(64);
        let mut reader = CommandReader::new(device, WAIT);

        host.write_all(b"E1").await.unwrap();
        let writer = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            host.write_all(b"2").await.unwrap();
            host
        };
        let (command, _host) = tokio::join!(reader.next_command(), writer);

        assert_eq!(command.unwrap(), Some(Command::new(CommandTag::Enroll, Some(12))));
    }
}
