//! Transport abstraction
//!
//! The protocol core never opens sockets itself; it hands a fully built
//! request to a [`Transport`] and gets the raw response back. One call is
//! exactly one request/response exchange: no retries, no pooling, no
//! pipelining. The concrete transport owns connection setup, teardown,
//! and timeouts.

mod http;

pub use http::HttpTransport;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Default exchange timeout in milliseconds for the HTTP transport
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Expected encoding of an exchange's response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Raw protocol frame bytes
    Binary,
    /// UTF-8 JSON text
    Json,
}

/// Errors raised by a transport implementation
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request could not be sent or the response could not be read
    #[error("transport request failed: {0}")]
    Request(String),

    /// The exchange did not complete within the transport's timeout
    #[error("transport timeout")]
    Timeout,

    /// The remote end answered with a non-success HTTP status
    #[error("unexpected HTTP status: {0}")]
    Status(u16),
}

/// One request/response byte exchange against an address and endpoint.
///
/// Bytes are the universal currency in both directions; [`WireFormat`]
/// tells the transport what response encoding the caller expects, which an
/// HTTP implementation maps onto content negotiation. Callers that speak
/// JSON convert to and from UTF-8 themselves.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name for diagnostics ("http", "mock", ...)
    fn name(&self) -> &'static str;

    /// Perform exactly one exchange and return the raw response body
    async fn write_read(
        &self,
        address: &str,
        endpoint: &str,
        payload: &[u8],
        format: WireFormat,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Holds the one active transport for a session.
///
/// Pure delegation with no protocol knowledge. Replacing the transport
/// takes `&mut self` while every exchange borrows the handler shared, so
/// a swap during an in-flight exchange is unrepresentable.
pub struct ConnectionHandler {
    transport: Box<dyn Transport>,
}

impl ConnectionHandler {
    /// Create a handler with the default HTTP transport
    pub fn new() -> Self {
        Self {
            transport: Box::new(HttpTransport::new()),
        }
    }

    /// Create a handler around a specific transport
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Replace the active transport with a fresh HTTP transport
    pub fn set_http_transport(&mut self) {
        self.transport = Box::new(HttpTransport::new());
    }

    /// Replace the active transport
    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = transport;
    }

    /// The active transport
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Name of the active transport backend
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }
}

impl Default for ConnectionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("transport", &self.transport.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport_is_http() {
        let handler = ConnectionHandler::new();
        assert_eq!(handler.transport_name(), "http");
    }

    #[test]
    fn test_set_http_transport() {
        let mut handler = ConnectionHandler::default();
        handler.set_http_transport();
        assert_eq!(handler.transport_name(), "http");
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "transport timeout");
        assert_eq!(
            TransportError::Status(503).to_string(),
            "unexpected HTTP status: 503"
        );
    }
}
