//! Response mapper: raw agent XML bodies into typed records.
//!
//! Stateless. Probe bodies become [`DeviceDescriptor`] trees; current and
//! sample bodies become a [`StreamHeader`] plus a timestamp-ordered list of
//! [`Observation`]s. The model layer consumes these records and never sees
//! XML.
//!
//! Matching is namespace-agnostic (local element names only), because agents
//! serve schema-versioned namespaces that vary by protocol release.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use roxmltree::{Document, Node};
use thiserror::Error;

/// Errors raised while mapping a response body.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not well-formed XML.
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// An expected structural element is absent.
    #[error("response has no {0} element")]
    MissingElement(&'static str),

    /// A Header sequence attribute is missing or not a number.
    #[error("header attribute {0} is missing or not a number")]
    InvalidSequence(&'static str),

    /// An observation element carries no timestamp attribute.
    #[error("observation for data item {0} has no timestamp")]
    MissingTimestamp(String),

    /// A timestamp attribute failed to parse.
    #[error("unparseable timestamp: {0}")]
    InvalidTimestamp(String),
}

/// One `Device` element of a probe response, with its nested tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub components: Vec<ComponentDescriptor>,
    pub data_items: Vec<DataItemDescriptor>,
}

/// A component element: nested components plus directly-attached data items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub id: String,
    pub name: String,
    pub components: Vec<ComponentDescriptor>,
    pub data_items: Vec<DataItemDescriptor>,
}

/// A `DataItem` element of a probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItemDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    pub item_type: String,
    pub sub_type: String,
    pub units: String,
    pub native_units: String,
}

/// Sequence cursors from the `Header` element of a current/sample response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub next_sequence: u64,
}

/// A single observed value from a current/sample response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub data_item_id: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Protocol sequence number, kept as text. Empty on elements without one.
    pub sequence: String,
    /// Raw text content of the element.
    pub value: String,
}

/// Parse a probe response body into device descriptors.
///
/// Fails with [`ParseError::MissingElement`] when the body has no `Devices`
/// collection.
pub fn parse_probe(body: &str) -> Result<Vec<DeviceDescriptor>, ParseError> {
    let doc = Document::parse(body)?;

    let devices = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Devices")
        .ok_or(ParseError::MissingElement("Devices"))?;

    Ok(devices
        .children()
        .filter(|n| n.is_element())
        .map(parse_device)
        .collect())
}

/// Parse a current or sample response body.
///
/// Returns the header cursors plus every observation in the document,
/// sorted ascending by timestamp. Agents interleave sample, event and
/// condition categories in document order, which does not match time order;
/// the sort restores it (stable, so equal timestamps keep document order).
pub fn parse_observations(body: &str) -> Result<(StreamHeader, Vec<Observation>), ParseError> {
    let doc = Document::parse(body)?;

    let header = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Header")
        .ok_or(ParseError::MissingElement("Header"))?;

    let header = StreamHeader {
        first_sequence: sequence_attr(header, "firstSequence")?,
        last_sequence: sequence_attr(header, "lastSequence")?,
        next_sequence: sequence_attr(header, "nextSequence")?,
    };

    // Every element carrying a dataItemId is an observation, at any depth
    // and regardless of category.
    let mut observations = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        let Some(id) = node.attribute("dataItemId") else {
            continue;
        };
        let raw = node
            .attribute("timestamp")
            .ok_or_else(|| ParseError::MissingTimestamp(id.to_string()))?;
        observations.push(Observation {
            data_item_id: id.to_string(),
            timestamp: parse_timestamp(raw)?,
            sequence: node.attribute("sequence").unwrap_or_default().to_string(),
            value: node.text().unwrap_or_default().to_string(),
        });
    }

    observations.sort_by_key(|o| o.timestamp);

    Ok((header, observations))
}

/// Parse an ISO-8601 timestamp, preserving its offset.
///
/// Accepts RFC 3339 (`2021-03-01T12:00:00.123Z`, explicit offsets) and
/// offset-less timestamps, which are taken as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts);
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

fn sequence_attr(node: Node<'_, '_>, name: &'static str) -> Result<u64, ParseError> {
    node.attribute(name)
        .and_then(|v| v.parse().ok())
        .ok_or(ParseError::InvalidSequence(name))
}

fn attr(node: Node<'_, '_>, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}

fn parse_device(node: Node<'_, '_>) -> DeviceDescriptor {
    // Description is optional; a device without one keeps empty metadata.
    let description = node
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Description");

    DeviceDescriptor {
        id: attr(node, "id"),
        name: attr(node, "name"),
        description: description
            .and_then(|n| n.text())
            .unwrap_or_default()
            .trim()
            .to_string(),
        manufacturer: description.map(|n| attr(n, "manufacturer")).unwrap_or_default(),
        serial_number: description.map(|n| attr(n, "serialNumber")).unwrap_or_default(),
        components: parse_components(node),
        data_items: parse_data_items(node),
    }
}

fn parse_component(node: Node<'_, '_>) -> ComponentDescriptor {
    ComponentDescriptor {
        id: attr(node, "id"),
        name: attr(node, "name"),
        components: parse_components(node),
        data_items: parse_data_items(node),
    }
}

/// Direct child components: element children of a `Components` container.
/// Component element names vary (`Axes`, `Controller`, `Linear`, ...), so
/// any element under the container counts.
fn parse_components(node: Node<'_, '_>) -> Vec<ComponentDescriptor> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "Components")
        .flat_map(|container| container.children().filter(|n| n.is_element()))
        .map(parse_component)
        .collect()
}

/// Directly-attached data items: `DataItem` children of a `DataItems`
/// container.
fn parse_data_items(node: Node<'_, '_>) -> Vec<DataItemDescriptor> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "DataItems")
        .flat_map(|container| container.children().filter(|n| n.is_element()))
        .filter(|n| n.tag_name().name() == "DataItem")
        .map(|n| DataItemDescriptor {
            id: attr(n, "id"),
            name: attr(n, "name"),
            category: attr(n, "category"),
            item_type: attr(n, "type"),
            sub_type: attr(n, "subType"),
            units: attr(n, "units"),
            native_units: attr(n, "nativeUnits"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MTConnectDevices xmlns="urn:mtconnect.org:MTConnectDevices:1.3">
  <Header creationTime="2021-03-01T12:00:00Z" sender="agent" instanceId="1" version="1.3.0" bufferSize="131072"/>
  <Devices>
    <Device id="dev1" name="Mazak01" uuid="M80104K162N">
      <Description manufacturer="Mazak" serialNumber="M80104K162N">Mill w/Smooth-G</Description>
      <DataItems>
        <DataItem id="dev1-avail" name="avail" category="EVENT" type="AVAILABILITY"/>
      </DataItems>
      <Components>
        <Axes id="ax1" name="base">
          <DataItems>
            <DataItem id="ax1-servo" name="servo" category="CONDITION" type="ACTUATOR"/>
          </DataItems>
          <Components>
            <Linear id="x1" name="X">
              <DataItems>
                <DataItem id="x1-pos" name="Xabs" category="SAMPLE" type="POSITION" subType="ACTUAL" units="MILLIMETER" nativeUnits="MILLIMETER"/>
                <DataItem id="x1-load" name="Xload" category="SAMPLE" type="LOAD" units="PERCENT" nativeUnits="PERCENT"/>
              </DataItems>
            </Linear>
          </Components>
        </Axes>
        <Controller id="ct1" name="controller">
          <DataItems>
            <DataItem id="ct1-mode" name="mode" category="EVENT" type="CONTROLLER_MODE"/>
          </DataItems>
        </Controller>
      </Components>
    </Device>
    <Device id="dev2" name="Okuma02">
      <DataItems>
        <DataItem id="dev2-avail" name="avail" category="EVENT" type="AVAILABILITY"/>
      </DataItems>
    </Device>
  </Devices>
</MTConnectDevices>"#;

    const STREAMS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MTConnectStreams xmlns="urn:mtconnect.org:MTConnectStreams:1.3">
  <Header creationTime="2021-03-01T12:00:05Z" sender="agent" instanceId="1" version="1.3.0" bufferSize="131072" firstSequence="1" lastSequence="458" nextSequence="459"/>
  <Streams>
    <DeviceStream name="Mazak01" uuid="M80104K162N">
      <ComponentStream component="Linear" name="X" componentId="x1">
        <Samples>
          <Position dataItemId="x1-pos" timestamp="2021-03-01T12:00:03.000Z" sequence="458" subType="ACTUAL">12.5</Position>
          <Load dataItemId="x1-load" timestamp="2021-03-01T12:00:01.000Z" sequence="456">31.0</Load>
        </Samples>
      </ComponentStream>
      <ComponentStream component="Device" name="Mazak01" componentId="dev1">
        <Events>
          <Availability dataItemId="dev1-avail" timestamp="2021-03-01T12:00:02.000Z" sequence="457">AVAILABLE</Availability>
        </Events>
      </ComponentStream>
    </DeviceStream>
  </Streams>
</MTConnectStreams>"#;

    #[test]
    fn probe_builds_device_tree() {
        let devices = parse_probe(PROBE_XML).unwrap();
        assert_eq!(devices.len(), 2);

        let mazak = &devices[0];
        assert_eq!(mazak.id, "dev1");
        assert_eq!(mazak.name, "Mazak01");
        assert_eq!(mazak.description, "Mill w/Smooth-G");
        assert_eq!(mazak.manufacturer, "Mazak");
        assert_eq!(mazak.serial_number, "M80104K162N");
        assert_eq!(mazak.data_items.len(), 1);
        assert_eq!(mazak.components.len(), 2);

        let axes = &mazak.components[0];
        assert_eq!(axes.id, "ax1");
        assert_eq!(axes.data_items.len(), 1);
        assert_eq!(axes.components.len(), 1);

        let linear = &axes.components[0];
        assert_eq!(linear.id, "x1");
        assert_eq!(linear.data_items.len(), 2);

        let pos = &linear.data_items[0];
        assert_eq!(pos.id, "x1-pos");
        assert_eq!(pos.name, "Xabs");
        assert_eq!(pos.category, "SAMPLE");
        assert_eq!(pos.item_type, "POSITION");
        assert_eq!(pos.sub_type, "ACTUAL");
        assert_eq!(pos.units, "MILLIMETER");
        assert_eq!(pos.native_units, "MILLIMETER");
    }

    #[test]
    fn probe_device_without_description_gets_empty_metadata() {
        let devices = parse_probe(PROBE_XML).unwrap();
        let okuma = &devices[1];
        assert_eq!(okuma.id, "dev2");
        assert_eq!(okuma.description, "");
        assert_eq!(okuma.manufacturer, "");
        assert!(okuma.components.is_empty());
    }

    #[test]
    fn probe_without_devices_element_is_malformed() {
        let body = r#"<MTConnectError><Errors><Error errorCode="OUT_OF_RANGE"/></Errors></MTConnectError>"#;
        let err = parse_probe(body).unwrap_err();
        assert!(matches!(err, ParseError::MissingElement("Devices")));
    }

    #[test]
    fn probe_rejects_invalid_xml() {
        assert!(matches!(parse_probe("<unclosed>"), Err(ParseError::Xml(_))));
    }

    #[test]
    fn observations_parse_header_cursors() {
        let (header, _) = parse_observations(STREAMS_XML).unwrap();
        assert_eq!(header.first_sequence, 1);
        assert_eq!(header.last_sequence, 458);
        assert_eq!(header.next_sequence, 459);
    }

    #[test]
    fn observations_sorted_ascending_by_timestamp() {
        // Document order is t3 (x1-pos), t1 (x1-load), t2 (dev1-avail).
        let (_, observations) = parse_observations(STREAMS_XML).unwrap();
        let ids: Vec<&str> = observations.iter().map(|o| o.data_item_id.as_str()).collect();
        assert_eq!(ids, vec!["x1-load", "dev1-avail", "x1-pos"]);
    }

    #[test]
    fn observation_carries_sequence_and_value() {
        let (_, observations) = parse_observations(STREAMS_XML).unwrap();
        let pos = observations.iter().find(|o| o.data_item_id == "x1-pos").unwrap();
        assert_eq!(pos.sequence, "458");
        assert_eq!(pos.value, "12.5");
        assert_eq!(pos.timestamp.to_rfc3339(), "2021-03-01T12:00:03+00:00");
    }

    #[test]
    fn observations_without_header_are_malformed() {
        let body = r#"<MTConnectStreams><Streams/></MTConnectStreams>"#;
        let err = parse_observations(body).unwrap_err();
        assert!(matches!(err, ParseError::MissingElement("Header")));
    }

    #[test]
    fn header_with_bad_sequence_is_malformed() {
        let body = r#"<MTConnectStreams>
          <Header firstSequence="1" lastSequence="oops" nextSequence="3"/>
        </MTConnectStreams>"#;
        let err = parse_observations(body).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSequence("lastSequence")));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let body = r#"<MTConnectStreams>
          <Header firstSequence="1" lastSequence="2" nextSequence="3"/>
          <Streams>
            <Position dataItemId="x1-pos" timestamp="not-a-time" sequence="2">1.0</Position>
          </Streams>
        </MTConnectStreams>"#;
        let err = parse_observations(body).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp(_)));
    }

    #[test]
    fn timestamp_offset_is_preserved() {
        let body = r#"<MTConnectStreams>
          <Header firstSequence="1" lastSequence="2" nextSequence="3"/>
          <Streams>
            <Position dataItemId="x1-pos" timestamp="2021-03-01T12:00:00+05:30" sequence="2">1.0</Position>
          </Streams>
        </MTConnectStreams>"#;
        let (_, observations) = parse_observations(body).unwrap();
        assert_eq!(observations[0].timestamp.to_rfc3339(), "2021-03-01T12:00:00+05:30");
    }

    #[test]
    fn offsetless_timestamp_is_taken_as_utc() {
        let body = r#"<MTConnectStreams>
          <Header firstSequence="1" lastSequence="2" nextSequence="3"/>
          <Streams>
            <Position dataItemId="x1-pos" timestamp="2021-03-01T12:00:00.250" sequence="2">1.0</Position>
          </Streams>
        </MTConnectStreams>"#;
        let (_, observations) = parse_observations(body).unwrap();
        assert_eq!(observations[0].timestamp.to_rfc3339(), "2021-03-01T12:00:00.250+00:00");
    }

    #[test]
    fn condition_elements_with_data_item_id_are_observations() {
        let body = r#"<MTConnectStreams>
          <Header firstSequence="1" lastSequence="2" nextSequence="3"/>
          <Streams>
            <Condition>
              <Normal dataItemId="ax1-servo" timestamp="2021-03-01T12:00:00Z" sequence="2"/>
            </Condition>
          </Streams>
        </MTConnectStreams>"#;
        let (_, observations) = parse_observations(body).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].data_item_id, "ax1-servo");
        assert_eq!(observations[0].value, "");
    }
}
