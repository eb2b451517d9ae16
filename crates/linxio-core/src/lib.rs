//! # LinxIO Core Library
//!
//! Core functionality for the LinxIO device client.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Binary frame encoding/decoding for LINX-compatible firmware
//! - A transport abstraction (HTTP today) for tunneling exchanges
//! - A device session exposing one method per peripheral command
//! - An agent session for device discovery and activation over JSON
//!
//! ## Example
//!
//! ```rust,ignore
//! use linxio_core::prelude::*;
//!
//! // Discover and activate a device through its agent
//! let mut agent = Agent::new("192.168.1.5:44300");
//! agent.enumerate_devices().await?;
//! agent.set_active_device("dev1").await?;
//!
//! // Command the device over the binary channel
//! let device = agent.active_device().expect("just activated");
//! device.digital_write(13, true).await?;
//! let reading = device.analog_read(2).await?;
//! ```

pub mod agent;
pub mod device;
pub mod protocol;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentError, SessionState};
    pub use crate::device::Device;
    pub use crate::protocol::{
        ApiVersion, BitOrder, Command, CsLogicLevel, DeviceId, I2cEofConfig, ProtocolError,
        ResponseFrame,
    };
    pub use crate::transport::{
        ConnectionHandler, HttpTransport, Transport, TransportError, WireFormat,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
