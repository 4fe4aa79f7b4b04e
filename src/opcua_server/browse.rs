use opcua::server::prelude::*;

use super::namespace::DEVICE_SET_ID;

/// A device found under `DeviceSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub browse_name: String,
    pub type_name: String,
}

fn browse_name_of(address_space: &AddressSpace, node_id: &NodeId) -> Option<String> {
    address_space
        .find_node(node_id)
        .map(|node| node.as_node().browse_name().name.as_ref().to_string())
}

/// List the devices aggregated by `DeviceSet` together with the browse name
/// of their type definition.
pub fn browse_devices(address_space: &AddressSpace, di_namespace: u16) -> Vec<DeviceSummary> {
    let device_set = NodeId::new(di_namespace, DEVICE_SET_ID);
    let references = address_space
        .find_references(&device_set, Some((ReferenceTypeId::Aggregates, true)))
        .unwrap_or_default();

    references
        .into_iter()
        .filter_map(|reference| {
            let node_id = reference.target_node;
            let browse_name = browse_name_of(address_space, &node_id)?;
            let type_name = address_space
                .find_references(&node_id, Some((ReferenceTypeId::HasTypeDefinition, false)))
                .and_then(|refs| refs.into_iter().next())
                .and_then(|type_ref| browse_name_of(address_space, &type_ref.target_node))
                .unwrap_or_else(|| "<unknown>".to_string());
            Some(DeviceSummary {
                browse_name,
                type_name,
            })
        })
        .collect()
}

pub fn log_devices(address_space: &AddressSpace, di_namespace: u16) -> usize {
    let devices = browse_devices(address_space, di_namespace);
    for device in &devices {
        tracing::info!("Found device {} of type {}", device.browse_name, device.type_name);
    }
    if devices.is_empty() {
        tracing::warn!("DeviceSet has no devices");
    }
    devices.len()
}
