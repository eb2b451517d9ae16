//! Protocol errors

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur while exchanging frames with a device
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Response was empty or did not begin with the sync byte
    #[error("response does not start with the 0xFF sync byte")]
    InvalidSync,

    /// Declared frame length disagrees with the received byte count
    #[error("invalid frame length: declared {declared}, received {received} bytes")]
    InvalidLength {
        /// Length byte carried inside the frame
        declared: u8,
        /// Number of bytes actually received
        received: usize,
    },

    /// Additive checksum over the frame body does not match the trailer
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum recomputed over the received bytes
        expected: u8,
        /// Trailing checksum byte the device sent
        actual: u8,
    },

    /// Structurally valid frame carried fewer payload bytes than the
    /// command's decoder requires
    #[error("response payload too short: needed {needed} bytes, got {got}")]
    PayloadTooShort {
        /// Payload bytes the decoder needed
        needed: usize,
        /// Payload bytes present in the frame
        got: usize,
    },

    /// Local precondition failed; no exchange was attempted
    #[error("invalid command arguments: {0}")]
    InvalidArguments(String),

    /// The underlying transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
