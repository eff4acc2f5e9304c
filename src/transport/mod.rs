//! Transport abstraction for talking to an MTConnect agent.
//!
//! The engine only needs "execute this request, get back a status and a
//! body". The [`Transport`] trait captures that seam; [`HttpTransport`] is
//! the reqwest-backed implementation used in production, and tests script
//! their own implementations against the same trait.

mod http;

pub use http::HttpTransport;

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

/// The three agent resources the client queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Structural model of the agent's devices.
    Probe,
    /// Latest value of every data item.
    Current,
    /// A page of historical observations from a sequence cursor.
    Sample,
}

impl Resource {
    /// Path of the resource relative to the agent base endpoint.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Probe => "probe",
            Resource::Current => "current",
            Resource::Sample => "sample",
        }
    }
}

/// A single GET-style request against an agent resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub resource: Resource,
    /// `from` query parameter: next sequence cursor (sample requests only).
    pub from: Option<u64>,
    /// `count` query parameter: page size (sample requests only).
    pub count: Option<u32>,
}

impl AgentRequest {
    /// Request for the device structural model.
    pub fn probe() -> Self {
        Self { resource: Resource::Probe, from: None, count: None }
    }

    /// Request for the latest value of every data item.
    pub fn current() -> Self {
        Self { resource: Resource::Current, from: None, count: None }
    }

    /// Request for a page of observations starting at `from`.
    pub fn sample(from: u64, count: u32) -> Self {
        Self { resource: Resource::Sample, from: Some(from), count: Some(count) }
    }
}

/// Raw agent response: HTTP status plus the undecoded body.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub status: u16,
    pub body: String,
}

impl AgentResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors that can occur while executing an agent request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("request timed out")]
    Timeout,
}

/// Trait for executing requests against an MTConnect agent.
///
/// Implementations must be cheap to share across tasks; the engine holds
/// one behind an `Arc` and calls it from both control calls and the
/// background sampling tick.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Execute the request and return the raw response.
    ///
    /// A non-success status is not an error at this layer; it is reported
    /// through [`AgentResponse::status`] and classified by the engine.
    async fn execute(&self, request: AgentRequest) -> Result<AgentResponse, TransportError>;
}
