//! Error types for the client engine and model accessors.

use thiserror::Error;

use crate::parse::ParseError;
use crate::transport::TransportError;

/// Errors surfaced by [`AgentClient`](crate::AgentClient) control calls and
/// by model accessors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No agent endpoint (or custom transport) was configured.
    #[error("agent endpoint is not configured")]
    Configuration,

    /// `probe` was called while another probe was still in flight.
    #[error("a probe is already in progress")]
    ProbeInProgress,

    /// A call that requires a device model was made before a successful probe.
    #[error("agent has not been probed yet")]
    NotProbed,

    /// The probe request failed; the previous model (if any) is untouched.
    #[error("probe request failed")]
    ProbeFailed(#[source] RequestError),

    /// A current request failed.
    #[error("current request failed")]
    CurrentFailed(#[source] RequestError),

    /// The initial current fetch of `start_sampling` failed.
    #[error("unable to start sampling, initial current request failed")]
    StartSamplingFailed(#[source] Box<ClientError>),

    /// An observation referenced a data item id absent from the model.
    ///
    /// During batch ingestion this is absorbed and logged, never raised;
    /// it only surfaces from explicit lookups.
    #[error("unknown data item id: {0}")]
    UnknownDataItem(String),

    /// The sample history has never received a sample.
    #[error("sample history is empty")]
    EmptyHistory,

    /// The sample history holds fewer than two samples.
    #[error("sample history only has 1 sample")]
    InsufficientHistory,
}

/// Failure of a single agent request, from dispatch through parsing.
///
/// Wrapped by [`ClientError::ProbeFailed`] and [`ClientError::CurrentFailed`];
/// background sample ticks absorb these into the consecutive-error counter
/// instead of raising them.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The transport could not complete the request.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The agent answered with a non-success HTTP status.
    #[error("agent returned status {0}")]
    Status(u16),

    /// The agent answered with an empty body.
    #[error("agent returned an empty body")]
    EmptyBody,

    /// The body did not match the expected document shape.
    #[error(transparent)]
    Malformed(#[from] ParseError),
}
