//! Devices and components of the probed tree.

use std::sync::Arc;

use crate::parse::{ComponentDescriptor, DeviceDescriptor};

use super::item::DataItem;

/// A component of a device: nested components plus directly-attached data
/// items. Forms a tree with no cycles; traversal is top-down only.
#[derive(Debug)]
pub struct Component {
    id: String,
    name: String,
    components: Vec<Component>,
    data_items: Vec<Arc<DataItem>>,
}

impl Component {
    pub(crate) fn from_descriptor(descriptor: &ComponentDescriptor, buffer_size: usize) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            components: descriptor
                .components
                .iter()
                .map(|c| Component::from_descriptor(c, buffer_size))
                .collect(),
            data_items: descriptor
                .data_items
                .iter()
                .map(|d| Arc::new(DataItem::from_descriptor(d, buffer_size)))
                .collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directly nested components.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Data items attached directly to this component.
    pub fn data_items(&self) -> &[Arc<DataItem>] {
        &self.data_items
    }
}

/// The root of one probe response element.
///
/// Immutable after construction except for its descendants' sample
/// histories.
#[derive(Debug)]
pub struct Device {
    id: String,
    name: String,
    description: String,
    manufacturer: String,
    serial_number: String,
    components: Vec<Component>,
    data_items: Vec<Arc<DataItem>>,
}

impl Device {
    pub(crate) fn from_descriptor(descriptor: &DeviceDescriptor, buffer_size: usize) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            manufacturer: descriptor.manufacturer.clone(),
            serial_number: descriptor.serial_number.clone(),
            components: descriptor
                .components
                .iter()
                .map(|c| Component::from_descriptor(c, buffer_size))
                .collect(),
            data_items: descriptor
                .data_items
                .iter()
                .map(|d| Arc::new(DataItem::from_descriptor(d, buffer_size)))
                .collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Components directly under the device.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Data items attached directly to the device.
    pub fn data_items(&self) -> &[Arc<DataItem>] {
        &self.data_items
    }
}
