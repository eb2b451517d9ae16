//! Frame encoding/decoding
//!
//! Implements the binary frame format with an 8-bit additive checksum.
//!
//! Request frame layout:
//! - 1 byte: 0xFF sync
//! - 1 byte: total frame length (including sync and checksum)
//! - 2 bytes: sequence number (big-endian)
//! - 2 bytes: command code (big-endian)
//! - N bytes: command parameters
//! - 1 byte: checksum (sum of all preceding bytes mod 256)
//!
//! Response frame layout:
//! - 1 byte: 0xFF sync
//! - 1 byte: total frame length
//! - 2 bytes: sequence number (big-endian)
//! - 1 byte: status
//! - N bytes: payload
//! - 1 byte: checksum

use byteorder::{BigEndian, ByteOrder};

use super::{ProtocolError, MAX_PARAMS_LEN, MIN_RESPONSE_LEN, REQUEST_OVERHEAD, SYNC_BYTE};

/// Byte index where a response's payload starts
const PAYLOAD_OFFSET: usize = 5;

/// 8-bit additive checksum: sum of all given bytes mod 256.
///
/// The same function covers both directions of the link; request
/// construction and response verification must agree byte for byte.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Build a complete request frame.
///
/// # Panics
///
/// Panics if `params` cannot fit a single frame's one-byte length field.
/// That is a contract violation by the caller, not a runtime condition:
/// every command in this crate produces parameter blocks well under the
/// limit or rejects oversized input before encoding.
pub fn encode_request(sequence: u16, command: u16, params: &[u8]) -> Vec<u8> {
    assert!(
        params.len() <= MAX_PARAMS_LEN,
        "command parameters exceed single-frame capacity ({} > {} bytes)",
        params.len(),
        MAX_PARAMS_LEN
    );

    let len = REQUEST_OVERHEAD + params.len();
    let mut frame = Vec::with_capacity(len);
    frame.push(SYNC_BYTE);
    frame.push(len as u8);

    let mut word = [0u8; 2];
    BigEndian::write_u16(&mut word, sequence);
    frame.extend_from_slice(&word);
    BigEndian::write_u16(&mut word, command);
    frame.extend_from_slice(&word);

    frame.extend_from_slice(params);
    frame.push(checksum(&frame));
    frame
}

/// A validated response frame
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    raw: Vec<u8>,
}

impl ResponseFrame {
    /// Decode and validate a response from raw bytes.
    ///
    /// Validates, in order: the sync byte, the declared length against the
    /// received byte count, and the trailing checksum. Each failure is
    /// terminal for the exchange; no partial recovery is attempted.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.first() != Some(&SYNC_BYTE) {
            return Err(ProtocolError::InvalidSync);
        }

        let declared = data.get(1).copied().unwrap_or(0);
        if data.len() != declared as usize || data.len() < MIN_RESPONSE_LEN {
            return Err(ProtocolError::InvalidLength {
                declared,
                received: data.len(),
            });
        }

        let expected = checksum(&data[..data.len() - 1]);
        let actual = data[data.len() - 1];
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(Self { raw: data.to_vec() })
    }

    /// The validated frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Sequence number echoed by the device
    pub fn sequence(&self) -> u16 {
        BigEndian::read_u16(&self.raw[2..4])
    }

    /// Status byte at index 4
    pub fn status(&self) -> u8 {
        self.raw[4]
    }

    /// Payload bytes between the status byte and the checksum
    pub fn payload(&self) -> &[u8] {
        &self.raw[PAYLOAD_OFFSET..self.raw.len() - 1]
    }

    /// Single payload byte at a payload-relative index
    pub fn payload_u8(&self, index: usize) -> Result<u8, ProtocolError> {
        let payload = self.payload();
        payload
            .get(index)
            .copied()
            .ok_or(ProtocolError::PayloadTooShort {
                needed: index + 1,
                got: payload.len(),
            })
    }

    /// Big-endian u16 at a payload-relative index
    pub fn payload_u16_be(&self, index: usize) -> Result<u16, ProtocolError> {
        let payload = self.payload();
        if payload.len() < index + 2 {
            return Err(ProtocolError::PayloadTooShort {
                needed: index + 2,
                got: payload.len(),
            });
        }
        Ok(BigEndian::read_u16(&payload[index..index + 2]))
    }

    /// Big-endian u32 at a payload-relative index
    pub fn payload_u32_be(&self, index: usize) -> Result<u32, ProtocolError> {
        let payload = self.payload();
        if payload.len() < index + 4 {
            return Err(ProtocolError::PayloadTooShort {
                needed: index + 4,
                got: payload.len(),
            });
        }
        Ok(BigEndian::read_u32(&payload[index..index + 4]))
    }

    /// Big-endian u32 at an absolute frame offset, checksum excluded.
    ///
    /// Only the baud-rate reply uses this: that firmware handler emits its
    /// 32-bit value one byte earlier than every other command, overlapping
    /// the status position.
    pub fn u32_be_at(&self, offset: usize) -> Result<u32, ProtocolError> {
        let body = &self.raw[..self.raw.len() - 1];
        if body.len() < offset + 4 {
            return Err(ProtocolError::PayloadTooShort {
                needed: offset + 4,
                got: body.len(),
            });
        }
        Ok(BigEndian::read_u32(&body[offset..offset + 4]))
    }
}

/// Builder for command parameter blocks
pub struct ParamsBuilder {
    buf: Vec<u8>,
}

impl ParamsBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.buf.push(b);
        self
    }

    /// Append a 16-bit value (big-endian)
    pub fn u16_be(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Append a 32-bit value (big-endian)
    pub fn u32_be(mut self, value: u32) -> Self {
        let mut bytes = [0u8; 4];
        BigEndian::write_u32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Append raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Finish and return the parameter block
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for ParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
