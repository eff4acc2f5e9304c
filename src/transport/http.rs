//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;

use super::{AgentRequest, AgentResponse, Transport, TransportError};

/// Executes agent requests over HTTP.
///
/// Issues GETs for `probe`, `current` and `sample` relative to the agent
/// base endpoint, with an XML `Accept` header and a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for the given agent base endpoint.
    ///
    /// A trailing slash on the endpoint is tolerated.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { client, endpoint: endpoint.trim_end_matches('/').to_string() })
    }

    /// The configured agent base endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: AgentRequest) -> Result<AgentResponse, TransportError> {
        let url = format!("{}/{}", self.endpoint, request.resource.path());

        let mut builder = self.client.get(&url).header(ACCEPT, "application/xml");
        if let Some(from) = request.from {
            builder = builder.query(&[("from", from.to_string())]);
        }
        if let Some(count) = request.count {
            builder = builder.query(&[("count", count.to_string())]);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(AgentResponse { status, body })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}
