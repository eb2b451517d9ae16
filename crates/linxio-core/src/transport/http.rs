//! HTTP transport
//!
//! POSTs request bodies to `address + endpoint` and returns the response
//! body bytes. The client applies a single overall timeout per exchange;
//! there is no retry and no connection state beyond reqwest's own pool.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{Transport, TransportError, WireFormat, DEFAULT_TIMEOUT_MS};

/// HTTP implementation of the [`Transport`] capability
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default 5 s exchange timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Create a transport with a specific exchange timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("linxio-core/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn write_read(
        &self,
        address: &str,
        endpoint: &str,
        payload: &[u8],
        format: WireFormat,
    ) -> Result<Vec<u8>, TransportError> {
        let url = format!("{address}{endpoint}");
        let content_type = match format {
            WireFormat::Binary => "application/octet-stream",
            WireFormat::Json => "application/json",
        };

        trace!(%url, bytes = payload.len(), ?format, "posting exchange");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, content_type)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Request(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(err.to_string())
            }
        })?;

        trace!(bytes = body.len(), "exchange complete");
        Ok(body.to_vec())
    }
}
