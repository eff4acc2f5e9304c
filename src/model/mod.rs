//! The owned device tree and its flattened data-item index.
//!
//! A [`DeviceModel`] is built once per successful probe and mutated only by
//! sample ingestion afterward. A new probe replaces the whole model, tree
//! and index together, so stale index entries never linger.

mod device;
mod item;
mod sample;

pub use device::{Component, Device};
pub use item::{DataItem, SampleBuffer};
pub use sample::Sample;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::parse::{DeviceDescriptor, Observation};

/// The tree of probed devices plus the id index used when streaming.
#[derive(Debug, Default)]
pub struct DeviceModel {
    devices: Vec<Device>,
    index: HashMap<String, Arc<DataItem>>,
}

impl DeviceModel {
    /// The model before any successful probe: no devices, empty index.
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Build the tree and the flattened index from probe descriptors.
    ///
    /// Duplicate data-item ids are resolved last-write-wins in the index
    /// (matching observed agent-facing behavior) and logged.
    pub(crate) fn build(descriptors: &[DeviceDescriptor], buffer_size: usize) -> Self {
        let devices: Vec<Device> = descriptors
            .iter()
            .map(|d| Device::from_descriptor(d, buffer_size))
            .collect();

        // Flatten with an explicit worklist rather than call-stack recursion;
        // device trees can be arbitrarily deep.
        let mut index = HashMap::new();
        for device in &devices {
            for item in device.data_items() {
                insert_indexed(&mut index, item);
            }
            let mut worklist: Vec<&Component> = device.components().iter().collect();
            while let Some(component) = worklist.pop() {
                worklist.extend(component.components());
                for item in component.data_items() {
                    insert_indexed(&mut index, item);
                }
            }
        }

        Self { devices, index }
    }

    /// Devices on the agent, in probe order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of indexed data items across the whole tree.
    pub fn data_item_count(&self) -> usize {
        self.index.len()
    }

    /// Ids of every indexed data item, in no particular order.
    pub fn data_item_ids(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Look up a data item by id.
    pub fn data_item(&self, id: &str) -> Result<&Arc<DataItem>, ClientError> {
        self.index.get(id).ok_or_else(|| ClientError::UnknownDataItem(id.to_string()))
    }

    /// Look up a data item by id, `None` when absent.
    pub fn get(&self, id: &str) -> Option<&Arc<DataItem>> {
        self.index.get(id)
    }

    /// Route an ingestion batch to the owning buffers.
    ///
    /// Observations must already be in ascending timestamp order (the mapper
    /// guarantees this). An id absent from the index is skipped and logged;
    /// it does not fail the batch. Returns how many observations applied.
    pub(crate) fn apply(&self, observations: Vec<Observation>) -> usize {
        let mut applied = 0;
        for observation in observations {
            match self.index.get(&observation.data_item_id) {
                Some(item) => {
                    item.add_sample(Sample::new(
                        observation.value,
                        observation.timestamp,
                        observation.sequence,
                    ));
                    applied += 1;
                }
                None => {
                    // Agents can grow data items between probes; skip until
                    // the next probe picks them up.
                    debug!(
                        data_item_id = %observation.data_item_id,
                        "skipping observation for unknown data item"
                    );
                }
            }
        }
        applied
    }

    /// Serializable view of the model: every device with the latest value of
    /// each of its data items (direct and nested).
    pub fn snapshot(&self) -> ModelSnapshot {
        let devices = self
            .devices
            .iter()
            .map(|device| {
                let mut items: Vec<&Arc<DataItem>> = device.data_items().iter().collect();
                let mut worklist: Vec<&Component> = device.components().iter().collect();
                while let Some(component) = worklist.pop() {
                    worklist.extend(component.components());
                    items.extend(component.data_items());
                }
                DeviceSnapshot {
                    id: device.id().to_string(),
                    name: device.name().to_string(),
                    data_items: items.into_iter().map(|i| item_snapshot(i)).collect(),
                }
            })
            .collect();
        ModelSnapshot { devices }
    }
}

fn insert_indexed(index: &mut HashMap<String, Arc<DataItem>>, item: &Arc<DataItem>) {
    if let Some(previous) = index.insert(item.id().to_string(), item.clone()) {
        warn!(
            data_item_id = %previous.id(),
            "duplicate data item id in probe response, last one wins"
        );
    }
}

fn item_snapshot(item: &DataItem) -> DataItemSnapshot {
    let current = item.current().ok();
    DataItemSnapshot {
        id: item.id().to_string(),
        name: item.name().to_string(),
        category: item.category().to_string(),
        item_type: item.item_type().to_string(),
        value: current.as_ref().map(|s| s.value().to_string()),
        timestamp: current.as_ref().map(|s| s.timestamp().to_rfc3339()),
    }
}

/// Point-in-time JSON-exportable view of the model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    pub devices: Vec<DeviceSnapshot>,
}

/// One device in a [`ModelSnapshot`], with its flattened data items.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub name: String,
    pub data_items: Vec<DataItemSnapshot>,
}

/// Latest state of one data item in a [`ModelSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct DataItemSnapshot {
    pub id: String,
    pub name: String,
    pub category: String,
    pub item_type: String,
    /// Latest value, `None` before the first observation.
    pub value: Option<String>,
    /// RFC 3339 timestamp of the latest value.
    pub timestamp: Option<String>,
}
