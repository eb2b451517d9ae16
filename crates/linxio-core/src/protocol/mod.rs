//! Binary device protocol
//!
//! Implements the length-prefixed frame format used by LINX-compatible
//! firmware: a sync byte, a one-byte frame length, a big-endian sequence
//! number and command code, command parameters, and a trailing 8-bit
//! additive checksum.
//!
//! Frames must be reproduced byte-exact to interoperate with the physical
//! firmware; the command table in [`commands`] is the authoritative list of
//! codes and parameter layouts.

pub mod commands;
mod error;
mod packet;

pub use commands::{ApiVersion, BitOrder, Command, CsLogicLevel, DeviceId, I2cEofConfig};
pub use error::ProtocolError;
pub use packet::{checksum, encode_request, ParamsBuilder, ResponseFrame};

/// Leading sync byte of every request and response frame
pub const SYNC_BYTE: u8 = 0xFF;

/// Fixed bytes wrapped around the parameters of a request frame
/// (sync, length, sequence, command code, trailing checksum)
pub const REQUEST_OVERHEAD: usize = 7;

/// Frame lengths travel in a single byte
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Largest parameter block a single request frame can carry
pub const MAX_PARAMS_LEN: usize = MAX_FRAME_LEN - REQUEST_OVERHEAD;

/// Shortest structurally valid response frame
/// (sync, length, sequence, status, checksum)
pub const MIN_RESPONSE_LEN: usize = 6;
