//! Native packet format of R30x/AS608 fingerprint modules.
//!
//! # Packet Structure
//!
//! ```text
//! ┌──────────┬───────────┬─────┬──────────┬──────────┬──────────┐
//! │  Header  │  Address  │ PID │  Length  │ Payload  │ Checksum │
//! │  0xEF01  │  4 bytes  │  1  │ 2 bytes  │ N bytes  │ 2 bytes  │
//! └──────────┴───────────┴─────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Multi-byte values are big-endian. `Length` counts the payload plus the
//! checksum. The checksum is the wrapping 16-bit sum of PID, both length
//! bytes and every payload byte.
//!
//! Command packets carry `[instruction, params...]`; acknowledgement packets
//! carry `[confirmation code, data...]`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::error::{Result, SensorError};

/// Start-of-packet marker.
pub const HEADER: u16 = 0xEF01;

/// Bytes before the payload: header, address, PID, length.
pub const PREAMBLE_SIZE: usize = 9;

/// Largest payload accepted when decoding.
pub const MAX_PAYLOAD_SIZE: usize = 256;

// ============================================================================
// Instructions
// ============================================================================

pub const INS_GET_IMAGE: u8 = 0x01;
pub const INS_IMAGE_TO_TZ: u8 = 0x02;
pub const INS_SEARCH: u8 = 0x04;
pub const INS_REG_MODEL: u8 = 0x05;
pub const INS_STORE: u8 = 0x06;
pub const INS_DELETE: u8 = 0x0C;
pub const INS_VERIFY_PASSWORD: u8 = 0x13;
pub const INS_TEMPLATE_COUNT: u8 = 0x1D;

// ============================================================================
// Confirmation Codes
// ============================================================================

pub const CODE_OK: u8 = 0x00;
pub const CODE_PACKET_RECEIVE_ERR: u8 = 0x01;
pub const CODE_NO_FINGER: u8 = 0x02;
pub const CODE_IMAGE_FAIL: u8 = 0x03;
pub const CODE_IMAGE_MESS: u8 = 0x06;
pub const CODE_FEATURE_FAIL: u8 = 0x07;
pub const CODE_NOT_FOUND: u8 = 0x09;
pub const CODE_ENROLL_MISMATCH: u8 = 0x0A;
pub const CODE_BAD_LOCATION: u8 = 0x0B;
pub const CODE_DELETE_FAIL: u8 = 0x10;
pub const CODE_WRONG_PASSWORD: u8 = 0x13;
pub const CODE_FLASH_ERR: u8 = 0x18;

/// Packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Command,
    Data,
    Ack,
    EndData,
}

impl PacketKind {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Command => 0x01,
            Self::Data => 0x02,
            Self::Ack => 0x07,
            Self::EndData => 0x08,
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = SensorError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Command),
            0x02 => Ok(Self::Data),
            0x07 => Ok(Self::Ack),
            0x08 => Ok(Self::EndData),
            other => Err(SensorError::invalid_packet(format!(
                "Unknown packet id {other:#04x}"
            ))),
        }
    }
}

/// A single framed packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub kind: PacketKind,
    pub payload: Bytes,
}

impl Packet {
    /// Build a command packet from an instruction and its parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_hardware::packet::{Packet, INS_GET_IMAGE};
    ///
    /// let packet = Packet::command(0xFFFF_FFFF, INS_GET_IMAGE, &[]);
    /// assert_eq!(
    ///     &packet.encode()[..],
    ///     &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x03, 0x01, 0x00, 0x05]
    /// );
    /// ```
    pub fn command(address: u32, instruction: u8, params: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(1 + params.len());
        payload.put_u8(instruction);
        payload.put_slice(params);
        Self {
            address,
            kind: PacketKind::Command,
            payload: payload.freeze(),
        }
    }

    /// Build an acknowledgement packet. Used by test links.
    pub fn ack(address: u32, code: u8, data: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(1 + data.len());
        payload.put_u8(code);
        payload.put_slice(data);
        Self {
            address,
            kind: PacketKind::Ack,
            payload: payload.freeze(),
        }
    }

    /// Instruction byte of a command, or confirmation code of an ack.
    pub fn code(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Payload bytes after the instruction / confirmation code.
    pub fn data(&self) -> &[u8] {
        self.payload.get(1..).unwrap_or_default()
    }

    /// Big-endian u16 at `offset` within [`Packet::data`].
    pub fn data_u16(&self, offset: usize) -> Result<u16> {
        let bytes = self.data().get(offset..offset + 2).ok_or_else(|| {
            SensorError::invalid_packet(format!(
                "Ack too short: need u16 at offset {offset}, have {} data bytes",
                self.data().len()
            ))
        })?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn length_field(&self) -> u16 {
        // Payload is bounded when decoding; commands are a handful of bytes.
        (self.payload.len() + 2) as u16
    }

    /// Checksum over PID, length and payload.
    pub fn checksum(&self) -> u16 {
        let length = self.length_field().to_be_bytes();
        self.payload
            .iter()
            .chain(&length)
            .fold(u16::from(self.kind.as_u8()), |sum, byte| {
                sum.wrapping_add(u16::from(*byte))
            })
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(PREAMBLE_SIZE + self.payload.len() + 2);
        buf.put_u16(HEADER);
        buf.put_u32(self.address);
        buf.put_u8(self.kind.as_u8());
        buf.put_u16(self.length_field());
        buf.put_slice(&self.payload);
        buf.put_u16(self.checksum());
        buf
    }

    /// Try to take one packet off the front of `buf`.
    ///
    /// Bytes before the header are discarded. Returns `Ok(None)` when more
    /// bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown packet id, an oversized or undersized
    /// length field, or a checksum mismatch. The offending packet is consumed.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>> {
        let header = HEADER.to_be_bytes();
        match buf.windows(2).position(|w| w == header) {
            Some(start) => buf.advance(start),
            None => {
                // Keep a trailing 0xEF, it may be the first half of a header.
                let keep = usize::from(buf.last() == Some(&header[0]));
                let drop = buf.len() - keep;
                buf.advance(drop);
                return Ok(None);
            }
        }

        if buf.len() < PREAMBLE_SIZE {
            return Ok(None);
        }

        let length = usize::from(u16::from_be_bytes([buf[7], buf[8]]));
        if !(3..=MAX_PAYLOAD_SIZE + 2).contains(&length) {
            buf.advance(2);
            return Err(SensorError::invalid_packet(format!(
                "Invalid length field {length}"
            )));
        }
        if buf.len() < PREAMBLE_SIZE + length {
            return Ok(None);
        }

        let mut frame = buf.split_to(PREAMBLE_SIZE + length);
        frame.advance(2);
        let address = frame.get_u32();
        let kind = PacketKind::try_from(frame.get_u8())?;
        frame.advance(2);
        let payload = frame.split_to(length - 2).freeze();
        let received = frame.get_u16();

        let packet = Self {
            address,
            kind,
            payload,
        };
        let expected = packet.checksum();
        if expected != received {
            return Err(SensorError::checksum_mismatch(expected, received));
        }

        Ok(Some(packet))
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("address", &format_args!("{:#010x}", self.address))
            .field("kind", &self.kind)
            .field("payload", &format_args!("{:02x?}", &self.payload[..]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: u32 = 0xFFFF_FFFF;

    #[test]
    fn test_encode_get_image() {
        let bytes = Packet::command(ADDR, INS_GET_IMAGE, &[]).encode();
        assert_eq!(
            &bytes[..],
            &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x03, 0x01, 0x00, 0x05]
        );
    }

    #[test]
    fn test_encode_store() {
        // Store buffer 1 into page 5
        let bytes = Packet::command(ADDR, INS_STORE, &[0x01, 0x00, 0x05]).encode();
        assert_eq!(&bytes[7..9], &[0x00, 0x06]);
        assert_eq!(&bytes[9..13], &[0x06, 0x01, 0x00, 0x05]);
        // 0x01 + 0x00 + 0x06 + 0x06 + 0x01 + 0x00 + 0x05
        assert_eq!(&bytes[13..], &[0x00, 0x13]);
    }

    #[test]
    fn test_decode_ack() {
        let ack = Packet::ack(ADDR, CODE_OK, &[0x00, 0x05, 0x00, 0x57]);
        let mut buf = ack.encode();
        let decoded = Packet::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded, ack);
        assert_eq!(decoded.code(), Some(CODE_OK));
        assert_eq!(decoded.data_u16(0).unwrap(), 5);
        assert_eq!(decoded.data_u16(2).unwrap(), 0x57);
        assert!(decoded.data_u16(3).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial() {
        let full = Packet::ack(ADDR, CODE_NO_FINGER, &[]).encode();
        let mut buf = BytesMut::from(&full[..5]);
        assert!(Packet::decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[5..]);
        let decoded = Packet::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.code(), Some(CODE_NO_FINGER));
    }

    #[test]
    fn test_decode_skips_leading_noise() {
        let mut buf = BytesMut::from(&[0x00, 0x42, 0xEF][..]);
        buf.extend_from_slice(&Packet::ack(ADDR, CODE_OK, &[]).encode());
        let decoded = Packet::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.kind, PacketKind::Ack);
    }

    #[test]
    fn test_decode_keeps_half_header() {
        let mut buf = BytesMut::from(&[0x10, 0x20, 0xEF][..]);
        assert!(Packet::decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], &[0xEF]);
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut buf = Packet::ack(ADDR, CODE_OK, &[]).encode();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let result = Packet::decode(&mut buf);
        assert!(matches!(result, Err(SensorError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_unknown_pid() {
        let mut buf = Packet::ack(ADDR, CODE_OK, &[]).encode();
        buf[6] = 0x55;
        assert!(matches!(
            Packet::decode(&mut buf),
            Err(SensorError::InvalidPacket { .. })
        ));
    }
}
