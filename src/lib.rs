//! # mtconnect-client
//!
//! A client for the MTConnect manufacturing-device telemetry protocol.
//!
//! The client discovers a device's structural model from an agent's probe
//! response, then polls for new observations (current/sample responses),
//! keeping an in-memory mirror of every monitored value with bounded
//! history. Consumers get a live, queryable snapshot of machine state
//! without re-parsing XML themselves.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         AgentClient                           │
//! │  ┌───────────┐    ┌─────────┐    ┌─────────┐    ┌──────────┐  │
//! │  │ transport │───▶│  parse  │───▶│  model  │───▶│ consumers│  │
//! │  │ (HTTP)    │    │ (mapper)│    │ (tree + │    │ (views + │  │
//! │  └───────────┘    └─────────┘    │ buffers)│    │  events) │  │
//! │        ▲                         └─────────┘    └──────────┘  │
//! │        └── probe / current / sample ticks (client)            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`transport`]**: the "execute request, get status and body" seam —
//!   [`Transport`] trait plus the reqwest-backed [`HttpTransport`]
//! - **[`parse`]**: stateless response mapper - probe bodies to device
//!   descriptors, current/sample bodies to timestamp-ordered observations
//! - **[`model`]**: the owned Device → Component → DataItem tree, the
//!   flattened id index, and per-item bounded sample histories
//! - **[`client`]**: the probe/current/sample state machine and the
//!   interval-driven sampling loop with bounded-retry auto-stop
//!
//! ## Usage
//!
//! ```no_run
//! use mtconnect_client::{AgentClient, ClientEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mtconnect_client::ClientError> {
//!     let client = AgentClient::builder()
//!         .endpoint("http://mill-3:5000")
//!         .build()?;
//!
//!     client.subscribe(|event| {
//!         if event == ClientEvent::DataChanged {
//!             println!("new observations");
//!         }
//!     });
//!
//!     client.probe().await?;
//!     client.start_sampling().await?;
//!
//!     // ... the model now tracks the agent ...
//!     let position = client.data_item("x1-pos")?;
//!     println!("X axis at {}", position.current()?);
//!
//!     client.stop_sampling();
//!     Ok(())
//! }
//! ```
//!
//! ## Failure behavior
//!
//! Control calls (`probe`, `get_current_state`, `start_sampling`) surface
//! typed [`ClientError`]s synchronously. Background sample ticks never
//! raise into caller code: failures feed a consecutive-error counter and
//! the loop stops itself (raising [`ClientEvent::SamplingStopped`]) when
//! the configured threshold is hit. A single observation for an unknown
//! data item is skipped and logged; the rest of its batch still applies.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod parse;
pub mod transport;

// Re-export main types for convenience
pub use client::{AgentClient, AgentClientBuilder};
pub use config::ClientConfig;
pub use error::{ClientError, RequestError};
pub use events::ClientEvent;
pub use model::{
    Component, DataItem, DataItemSnapshot, Device, DeviceModel, DeviceSnapshot, ModelSnapshot,
    Sample, SampleBuffer,
};
pub use parse::{
    ComponentDescriptor, DataItemDescriptor, DeviceDescriptor, Observation, ParseError,
    StreamHeader,
};
pub use transport::{
    AgentRequest, AgentResponse, HttpTransport, Resource, Transport, TransportError,
};
