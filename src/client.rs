//! The client engine: probe/current/sample state machine.
//!
//! An [`AgentClient`] connects to a single agent. `probe` discovers the
//! device model, `get_current_state` fetches the latest value of every data
//! item, and `start_sampling` begins an interval-driven polling loop that
//! keeps the model's sample histories current. Streaming (chunked
//! multipart) delivery is not supported; interval polling emulates it.
//!
//! The sampling loop is a recurring timed task, not a dedicated thread:
//! only one tick is ever in flight, a slow request delays the next tick
//! rather than overlapping it, and `stop_sampling` (or dropping the client)
//! cancels a pending tick before its apply step runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, RequestError};
use crate::events::{ClientEvent, Observers};
use crate::model::{DataItem, DeviceModel, ModelSnapshot};
use crate::parse::{self, Observation, StreamHeader};
use crate::transport::{AgentRequest, HttpTransport, Transport};

/// Engine states. `Probing` is re-entrant-guarded; the rest gate which
/// control calls are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Probing,
    Probed,
    SamplingActive,
    SamplingStopped,
}

/// Sequence cursors from the most recently parsed stream header.
#[derive(Debug, Default, Clone, Copy)]
struct Cursors {
    first: u64,
    last: u64,
    next: u64,
}

/// Stop signal for the running sampling loop.
#[derive(Debug)]
struct SamplingHandle {
    stop: watch::Sender<bool>,
}

#[derive(Debug)]
struct Inner {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    model: RwLock<DeviceModel>,
    phase: Mutex<Phase>,
    cursors: Mutex<Cursors>,
    /// Consecutive failed sample ticks; resets to 0 on success.
    error_count: AtomicU32,
    observers: Observers,
    sampling: Mutex<Option<SamplingHandle>>,
}

impl Inner {
    /// Apply one ingestion batch: advance cursors from the header, route
    /// observations to their buffers, raise `DataChanged` if any applied.
    fn ingest(&self, header: StreamHeader, observations: Vec<Observation>) -> usize {
        {
            let mut cursors = self.cursors.lock();
            cursors.first = header.first_sequence;
            cursors.last = header.last_sequence;
            cursors.next = header.next_sequence;
        }
        let applied = self.model.read().apply(observations);
        if applied > 0 {
            self.observers.notify(ClientEvent::DataChanged);
        }
        applied
    }

    fn is_probed(&self) -> bool {
        matches!(
            *self.phase.lock(),
            Phase::Probed | Phase::SamplingActive | Phase::SamplingStopped
        )
    }
}

/// Client for a single MTConnect agent.
///
/// Not `Clone`: the client owns the sampling loop, and dropping it cancels
/// any pending tick deterministically.
///
/// Control calls (`probe`, `get_current_state`, `start_sampling`) are meant
/// to be serialized by the caller; the engine only guards against a second
/// probe racing a first. Model mutation itself is always lock-protected, so
/// a concurrent reader never observes a half-replaced tree.
#[derive(Debug)]
pub struct AgentClient {
    inner: Arc<Inner>,
}

impl AgentClient {
    /// Start configuring a client.
    pub fn builder() -> AgentClientBuilder {
        AgentClientBuilder::default()
    }

    /// Register an observer for [`ClientEvent`]s.
    ///
    /// Delivery is synchronous and in subscription order, on the task that
    /// caused the event.
    pub fn subscribe(&self, observer: impl Fn(ClientEvent) + Send + Sync + 'static) {
        self.inner.observers.subscribe(Box::new(observer));
    }

    /// Fetch the probe response and rebuild the device model.
    ///
    /// On success the previous model and index are replaced wholesale and
    /// `ProbeCompleted` is raised before returning. On failure the previous
    /// model is untouched.
    pub async fn probe(&self) -> Result<(), ClientError> {
        let transport = self.configured_transport()?;

        let prior = {
            let mut phase = self.inner.phase.lock();
            if *phase == Phase::Probing {
                return Err(ClientError::ProbeInProgress);
            }
            let prior = *phase;
            *phase = Phase::Probing;
            prior
        };

        match probe_model(transport.as_ref(), &self.inner.config).await {
            Ok(model) => {
                info!(
                    devices = model.device_count(),
                    data_items = model.data_item_count(),
                    "probe completed"
                );
                *self.inner.model.write() = model;
                *self.inner.phase.lock() = match prior {
                    // Re-probing under an active loop keeps the loop running.
                    Phase::SamplingActive => Phase::SamplingActive,
                    _ => Phase::Probed,
                };
                self.inner.observers.notify(ClientEvent::ProbeCompleted);
                Ok(())
            }
            Err(e) => {
                *self.inner.phase.lock() = prior;
                Err(ClientError::ProbeFailed(e))
            }
        }
    }

    /// Fetch the current response and update every data item's history.
    ///
    /// Requires a completed probe. Advances the sequence cursors from the
    /// response header, so a following `start_sampling` pages from the right
    /// place. Raises `DataChanged` if at least one observation applied.
    pub async fn get_current_state(&self) -> Result<(), ClientError> {
        if !self.inner.is_probed() {
            return Err(ClientError::NotProbed);
        }
        let transport = self.configured_transport()?;

        let body = fetch(transport.as_ref(), AgentRequest::current())
            .await
            .map_err(ClientError::CurrentFailed)?;
        let (header, observations) = parse::parse_observations(&body)
            .map_err(|e| ClientError::CurrentFailed(e.into()))?;

        self.inner.ingest(header, observations);
        Ok(())
    }

    /// Start the interval-driven sampling loop.
    ///
    /// No-op if sampling is already active. Performs one
    /// [`get_current_state`](Self::get_current_state) first (its failure is
    /// wrapped in [`ClientError::StartSamplingFailed`]); the first sample
    /// request then fires immediately rather than after one interval.
    ///
    /// The loop self-heals through transient failures: each failed tick
    /// increments a consecutive-error counter (reset by any success), and
    /// when it reaches `max_sampling_error_count` the loop stops itself and
    /// raises `SamplingStopped`.
    pub async fn start_sampling(&self) -> Result<(), ClientError> {
        if self.sampling_active() {
            return Ok(());
        }

        self.get_current_state()
            .await
            .map_err(|e| ClientError::StartSamplingFailed(Box::new(e)))?;

        // get_current_state already guaranteed a configured transport.
        let transport = self.configured_transport()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut sampling = self.inner.sampling.lock();
            if sampling.is_some() {
                return Ok(());
            }
            *sampling = Some(SamplingHandle { stop: stop_tx });
        }
        *self.inner.phase.lock() = Phase::SamplingActive;
        self.inner.error_count.store(0, Ordering::Relaxed);
        info!(interval = ?self.inner.config.update_interval, "sampling started");

        tokio::spawn(sampling_loop(Arc::clone(&self.inner), transport, stop_rx));
        Ok(())
    }

    /// Stop the sampling loop. Idempotent.
    ///
    /// A tick that is scheduled or in flight is cancelled before its
    /// apply-observations step.
    pub fn stop_sampling(&self) {
        let Some(handle) = self.inner.sampling.lock().take() else {
            return;
        };
        let _ = handle.stop.send(true);
        *self.inner.phase.lock() = Phase::SamplingStopped;
        self.inner.observers.notify(ClientEvent::SamplingStopped);
        info!("sampling stopped");
    }

    /// True while the sampling loop is running.
    pub fn sampling_active(&self) -> bool {
        matches!(*self.inner.phase.lock(), Phase::SamplingActive)
    }

    /// Consecutive failed sample ticks since the last success.
    pub fn sampling_error_count(&self) -> u32 {
        self.inner.error_count.load(Ordering::Relaxed)
    }

    /// First sequence number available from the agent stream.
    pub fn first_sequence(&self) -> u64 {
        self.inner.cursors.lock().first
    }

    /// Last sequence number available from the agent stream.
    pub fn last_sequence(&self) -> u64 {
        self.inner.cursors.lock().last
    }

    /// Next sequence number the sampling loop will request from.
    pub fn next_sequence(&self) -> u64 {
        self.inner.cursors.lock().next
    }

    /// Read-only access to the device model.
    ///
    /// Holds a read lock for the guard's lifetime; keep it short. A probe
    /// replacing the model blocks until readers release.
    pub fn model(&self) -> RwLockReadGuard<'_, DeviceModel> {
        self.inner.model.read()
    }

    /// Look up a data item by id; the returned handle stays valid across
    /// ingestion (but not across a re-probe, which builds new items).
    pub fn data_item(&self, id: &str) -> Result<Arc<DataItem>, ClientError> {
        self.inner.model.read().data_item(id).cloned()
    }

    /// Serializable point-in-time view of the model.
    pub fn snapshot(&self) -> ModelSnapshot {
        self.inner.model.read().snapshot()
    }

    fn configured_transport(&self) -> Result<Arc<dyn Transport>, ClientError> {
        self.inner.transport.clone().ok_or(ClientError::Configuration)
    }
}

impl Drop for AgentClient {
    fn drop(&mut self) {
        // Cancel the loop without raising events from a destructor.
        if let Some(handle) = self.inner.sampling.lock().take() {
            let _ = handle.stop.send(true);
        }
    }
}

/// Execute a request and gate on status and body presence.
async fn fetch(transport: &dyn Transport, request: AgentRequest) -> Result<String, RequestError> {
    let response = transport.execute(request).await?;
    if !response.is_success() {
        return Err(RequestError::Status(response.status));
    }
    if response.body.trim().is_empty() {
        return Err(RequestError::EmptyBody);
    }
    Ok(response.body)
}

async fn probe_model(
    transport: &dyn Transport,
    config: &ClientConfig,
) -> Result<DeviceModel, RequestError> {
    let body = fetch(transport, AgentRequest::probe()).await?;
    let descriptors = parse::parse_probe(&body)?;
    Ok(DeviceModel::build(&descriptors, config.buffer_size))
}

/// One sample tick: request the next page and ingest it.
async fn sample_tick(inner: &Inner, transport: &dyn Transport) -> Result<usize, RequestError> {
    let from = inner.cursors.lock().next;
    let count = inner.config.sample_request_size;
    debug!(from, count, "sample tick");

    let body = fetch(transport, AgentRequest::sample(from, count)).await?;
    let (header, observations) = parse::parse_observations(&body)?;
    Ok(inner.ingest(header, observations))
}

/// The recurring sampling task.
///
/// `biased` keeps the stop branch ahead of the tick: once a stop is sent,
/// neither a pending sleep nor an in-flight request gets to apply its batch.
async fn sampling_loop(
    inner: Arc<Inner>,
    transport: Arc<dyn Transport>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let interval = inner.config.update_interval;
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            result = sample_tick(&inner, transport.as_ref()) => match result {
                Ok(applied) => {
                    inner.error_count.store(0, Ordering::Relaxed);
                    debug!(applied, "sample tick applied");
                }
                Err(e) => {
                    let errors = inner.error_count.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(error = %e, consecutive = errors, "sample request failed");
                    if errors >= inner.config.max_sampling_error_count {
                        warn!(
                            max = inner.config.max_sampling_error_count,
                            "too many consecutive sampling errors, stopping"
                        );
                        inner.sampling.lock().take();
                        *inner.phase.lock() = Phase::SamplingStopped;
                        inner.observers.notify(ClientEvent::SamplingStopped);
                        break;
                    }
                }
            },
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Builder for [`AgentClient`].
///
/// An endpoint (or a custom transport) must be provided before `probe` can
/// succeed, but building without one is allowed; `probe` then fails with
/// [`ClientError::Configuration`].
#[derive(Debug, Default)]
pub struct AgentClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl AgentClientBuilder {
    /// Base URI of the agent, e.g. `http://mill-3:5000`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    /// Time between sample requests. Default 2 seconds.
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.config.update_interval = interval;
        self
    }

    /// Observations per sample page. Default 100.
    pub fn sample_request_size(mut self, count: u32) -> Self {
        self.config.sample_request_size = count;
        self
    }

    /// Consecutive tick failures tolerated before auto-stop. Default 3.
    pub fn max_sampling_error_count(mut self, count: u32) -> Self {
        self.config.max_sampling_error_count = count;
        self
    }

    /// Per-request HTTP timeout. Default 5 seconds.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sample history kept per data item. Default 100.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Use a custom transport instead of the HTTP one built from the
    /// endpoint. The seam tests use to script agent responses.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AgentClient, ClientError> {
        let transport = match (self.transport, &self.config.endpoint) {
            (Some(transport), _) => Some(transport),
            (None, Some(endpoint)) if !endpoint.is_empty() => {
                let http = HttpTransport::new(endpoint, self.config.request_timeout)
                    .map_err(|_| ClientError::Configuration)?;
                Some(Arc::new(http) as Arc<dyn Transport>)
            }
            (None, _) => None,
        };

        Ok(AgentClient {
            inner: Arc::new(Inner {
                config: self.config,
                transport,
                model: RwLock::new(DeviceModel::empty()),
                phase: Mutex::new(Phase::Idle),
                cursors: Mutex::new(Cursors::default()),
                error_count: AtomicU32::new(0),
                observers: Observers::default(),
                sampling: Mutex::new(None),
            }),
        })
    }
}
