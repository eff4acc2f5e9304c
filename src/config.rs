//! Client configuration.

use std::time::Duration;

/// Configuration surface of the client engine.
///
/// Built through [`AgentClient::builder`](crate::AgentClient::builder);
/// every field has the agent-friendly default below.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URI of the agent (e.g. `http://mill-3:5000`). Required before
    /// any call; `probe` fails with
    /// [`ClientError::Configuration`](crate::ClientError::Configuration)
    /// when unset.
    pub endpoint: Option<String>,

    /// Time between sample requests. Default 2 seconds.
    pub update_interval: Duration,

    /// How many observations to request per sample page (`count` query
    /// parameter). Default 100.
    pub sample_request_size: u32,

    /// How many consecutive failed sample ticks to tolerate before sampling
    /// stops itself. Default 3.
    pub max_sampling_error_count: u32,

    /// Per-request timeout for the HTTP transport. Default 5 seconds.
    pub request_timeout: Duration,

    /// Maximum sample history kept per data item. Default 100.
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            update_interval: Duration::from_secs(2),
            sample_request_size: 100,
            max_sampling_error_count: 3,
            request_timeout: Duration::from_secs(5),
            buffer_size: 100,
        }
    }
}
