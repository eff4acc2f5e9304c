//! Data items and their bounded sample histories.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ClientError;
use crate::parse::DataItemDescriptor;

use super::sample::Sample;

/// Bounded, insertion-ordered history of samples for one data item.
///
/// Eviction is strict FIFO by insertion order at the configured capacity.
/// The mapper hands observations over sorted by timestamp, so insertion
/// order normally matches time order; an out-of-order append is tolerated
/// and still evicts oldest-by-insertion first.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: VecDeque<Arc<Sample>>,
    capacity: usize,
}

impl SampleBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity.min(16)), capacity }
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push_back(Arc::new(sample));
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// The most recently inserted sample.
    pub fn current(&self) -> Result<Arc<Sample>, ClientError> {
        self.samples.back().cloned().ok_or(ClientError::EmptyHistory)
    }

    /// The sample inserted immediately before the current one.
    pub fn previous(&self) -> Result<Arc<Sample>, ClientError> {
        if self.samples.len() < 2 {
            return Err(ClientError::InsufficientHistory);
        }
        Ok(self.samples[self.samples.len() - 2].clone())
    }

    /// Read-only ordered view of the history, oldest first.
    pub fn samples(&self) -> Vec<Arc<Sample>> {
        self.samples.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A single monitored value with a stable identity.
///
/// Metadata is immutable after the probe that created it; only the sample
/// history changes, under its own lock, as observations are ingested.
#[derive(Debug)]
pub struct DataItem {
    id: String,
    name: String,
    category: String,
    item_type: String,
    sub_type: String,
    units: String,
    native_units: String,
    buffer: RwLock<SampleBuffer>,
}

impl DataItem {
    pub(crate) fn from_descriptor(descriptor: &DataItemDescriptor, buffer_size: usize) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            category: descriptor.category.clone(),
            item_type: descriptor.item_type.clone(),
            sub_type: descriptor.sub_type.clone(),
            units: descriptor.units.clone(),
            native_units: descriptor.native_units.clone(),
            buffer: RwLock::new(SampleBuffer::new(buffer_size)),
        }
    }

    /// Globally unique id across the whole device tree.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the `category` attribute (SAMPLE, EVENT, CONDITION).
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Value of the `type` attribute.
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// Value of the `subType` attribute.
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn native_units(&self) -> &str {
        &self.native_units
    }

    /// The most recent sample.
    pub fn current(&self) -> Result<Arc<Sample>, ClientError> {
        self.buffer.read().current()
    }

    /// The sample before the most recent one.
    pub fn previous(&self) -> Result<Arc<Sample>, ClientError> {
        self.buffer.read().previous()
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<Arc<Sample>> {
        self.buffer.read().samples()
    }

    /// Number of samples currently held.
    pub fn history_len(&self) -> usize {
        self.buffer.read().len()
    }

    pub(crate) fn add_sample(&self, sample: Sample) {
        self.buffer.write().push(sample);
    }
}
