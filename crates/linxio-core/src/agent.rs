//! Agent session layer
//!
//! The agent is the JSON-speaking session manager that discovers and
//! activates physical devices. Commands travel as a one-element envelope
//! `{"agent": [{"command": ...}]}` POSTed to the agent's `/config`
//! endpoint; replies are valid only when they parse as JSON, carry an
//! `agent` array, and every element reports `statusCode` 0.
//!
//! On successful activation the agent appends a [`Device`] bound to its
//! own address: the binary channel and the JSON control channel share one
//! address and port.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::device::Device;
use crate::transport::{ConnectionHandler, TransportError, WireFormat};

/// Agent control endpoint
const CONFIG_ENDPOINT: &str = "/config";

/// Errors raised by the agent control channel
#[derive(Error, Debug)]
pub enum AgentError {
    /// The underlying transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The reply body was not valid JSON
    #[error("agent reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The reply parsed but carried no `agent` array; the full reply is
    /// attached as context
    #[error("agent reply is missing the 'agent' array: {0}")]
    MalformedReply(Value),

    /// At least one reply element reported a nonzero status; the full
    /// reply is attached so callers can inspect which element failed
    #[error("agent command reported failure: {0}")]
    CommandFailed(Value),
}

/// Where the session stands in the device-selection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No devices enumerated or active
    Idle,
    /// A device listing has been fetched
    DevicesEnumerated,
    /// A device is activated and addressable
    DeviceActive,
}

#[derive(Serialize)]
struct Envelope<'a> {
    agent: [EnvelopeCommand<'a>; 1],
}

#[derive(Serialize)]
struct EnvelopeCommand<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
}

/// Prefix scheme-less addresses so they are usable as URLs
fn normalize_address(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// JSON-speaking session manager for device discovery and activation
pub struct Agent {
    address: String,
    connection: ConnectionHandler,
    devices: Vec<Device>,
    active_device_index: Option<usize>,
    state: SessionState,
}

impl Agent {
    /// Create an agent session using the default HTTP transport
    pub fn new(address: &str) -> Self {
        Self::with_connection(address, ConnectionHandler::new())
    }

    /// Create an agent session around an existing connection handler
    pub fn with_connection(address: &str, connection: ConnectionHandler) -> Self {
        Self {
            address: normalize_address(address),
            connection,
            devices: Vec::new(),
            active_device_index: None,
            state: SessionState::Idle,
        }
    }

    /// Normalized agent address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Devices activated during this session, oldest first
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Index of the most recently activated device, if one is active
    pub fn active_device_index(&self) -> Option<usize> {
        self.active_device_index
    }

    /// The active device, if one is active
    pub fn active_device(&mut self) -> Option<&mut Device> {
        let index = self.active_device_index?;
        self.devices.get_mut(index)
    }

    /// The session's connection handler
    pub fn connection(&self) -> &ConnectionHandler {
        &self.connection
    }

    /// Mutable access for transport replacement; exclusive access
    /// guarantees no exchange is in flight during a swap
    pub fn connection_mut(&mut self) -> &mut ConnectionHandler {
        &mut self.connection
    }

    /// Send one command envelope and validate the reply shape
    async fn send_command(&self, command: &str, device: Option<&str>) -> Result<Value, AgentError> {
        let envelope = Envelope {
            agent: [EnvelopeCommand { command, device }],
        };
        let body = serde_json::to_vec(&envelope)?;

        debug!(command, address = %self.address, "sending agent command");

        let raw = self
            .connection
            .transport()
            .write_read(&self.address, CONFIG_ENDPOINT, &body, WireFormat::Json)
            .await?;
        let reply: Value = serde_json::from_slice(&raw)?;

        let all_ok = reply.get("agent").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .all(|item| item.get("statusCode").and_then(Value::as_i64) == Some(0))
        });
        match all_ok {
            None => Err(AgentError::MalformedReply(reply)),
            Some(false) => Err(AgentError::CommandFailed(reply)),
            Some(true) => Ok(reply),
        }
    }

    /// List devices the agent can reach
    pub async fn enumerate_devices(&mut self) -> Result<Value, AgentError> {
        let reply = self.send_command("enumerateDevices", None).await?;
        if self.state == SessionState::Idle {
            self.state = SessionState::DevicesEnumerated;
        }
        Ok(reply)
    }

    /// Query agent metadata
    pub async fn get_agent_info(&self) -> Result<Value, AgentError> {
        self.send_command("getInfo", None).await
    }

    /// Query which device the agent currently exposes
    pub async fn get_active_device(&self) -> Result<Value, AgentError> {
        self.send_command("getActiveDevice", None).await
    }

    /// Activate a device by id and bind a [`Device`] session to it
    pub async fn set_active_device(&mut self, device_id: &str) -> Result<Value, AgentError> {
        let reply = self.send_command("setActiveDevice", Some(device_id)).await?;

        self.devices.push(Device::new(self.address.clone()));
        self.active_device_index = Some(self.devices.len() - 1);
        self.state = SessionState::DeviceActive;

        debug!(
            device = device_id,
            index = self.devices.len() - 1,
            "device activated"
        );
        Ok(reply)
    }

    /// Release the active device and return the session to idle.
    ///
    /// Activated device handles stay in [`devices`](Self::devices) until
    /// the agent itself is dropped; only the active index is cleared.
    pub async fn release_active_device(&mut self) -> Result<Value, AgentError> {
        let reply = self.send_command("releaseActiveDevice", None).await?;
        self.active_device_index = None;
        self.state = SessionState::Idle;
        Ok(reply)
    }
}
