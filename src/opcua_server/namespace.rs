//! Device-model namespace for the luminescence reader.
//!
//! Mirrors the parts of the DI and LADS nodesets the sample server needs:
//! `DeviceSet` in the DI namespace, one `LuminescenceReader` device below it
//! and the reader's function set with the variables the sensor loop writes.

use opcua::server::prelude::*;

use crate::config::{DI_NAMESPACE_URI, READER_NAMESPACE_URI};
use crate::error::StartupError;
use crate::simulator::device::{AMBIENT_TEMPERATURE, DEFAULT_TARGET_TEMPERATURE};
use crate::simulator::physics::WELLS;
use crate::sink::DeviceNode;

/// Stable identifier of `DeviceSet` in the DI namespace.
pub const DEVICE_SET_ID: u32 = 5001;

const DEVICE_TYPE_ID: u32 = 1002;
const DEVICE_ID: u32 = 5002;
const FUNCTION_SET_ID: u32 = 5048;

/// Build the device model and return the DI namespace index.
pub fn load_namespace(address_space: &mut AddressSpace) -> Result<u16, StartupError> {
    let di = address_space
        .register_namespace(DI_NAMESPACE_URI)
        .map_err(|_| StartupError::Namespace(format!("cannot register {}", DI_NAMESPACE_URI)))?;
    let reader = address_space
        .register_namespace(READER_NAMESPACE_URI)
        .map_err(|_| StartupError::Namespace(format!("cannot register {}", READER_NAMESPACE_URI)))?;

    let device_set = NodeId::new(di, DEVICE_SET_ID);
    insert(
        ObjectBuilder::new(&device_set, QualifiedName::new(di, "DeviceSet"), "DeviceSet")
            .organized_by(ObjectId::ObjectsFolder)
            .has_type_definition(ObjectTypeId::BaseObjectType)
            .insert(address_space),
        &device_set,
    )?;

    let device_type = NodeId::new(reader, DEVICE_TYPE_ID);
    insert(
        ObjectTypeBuilder::new(
            &device_type,
            QualifiedName::new(reader, "LuminescenceReaderDeviceType"),
            "LuminescenceReaderDeviceType",
        )
        .subtype_of(ObjectTypeId::BaseObjectType)
        .insert(address_space),
        &device_type,
    )?;

    let device = NodeId::new(reader, DEVICE_ID);
    insert(
        ObjectBuilder::new(&device, QualifiedName::new(reader, "LuminescenceReader"), "LuminescenceReader")
            .component_of(&device_set)
            .has_type_definition(&device_type)
            .insert(address_space),
        &device,
    )?;

    let function_set = NodeId::new(reader, FUNCTION_SET_ID);
    insert(
        ObjectBuilder::new(&function_set, QualifiedName::new(reader, "FunctionSet"), "FunctionSet")
            .component_of(&device)
            .has_type_definition(ObjectTypeId::BaseObjectType)
            .insert(address_space),
        &function_set,
    )?;

    let functions = [
        DeviceNode::Cover,
        DeviceNode::Injector1,
        DeviceNode::Injector2,
        DeviceNode::Injector3,
        DeviceNode::LuminescenceSensor,
        DeviceNode::ShakerController,
        DeviceNode::TemperatureController,
        DeviceNode::WastePump,
    ];
    for function in functions {
        let id = node_id(reader, function);
        insert(
            ObjectBuilder::new(&id, QualifiedName::new(reader, function.browse_name()), function.browse_name())
                .component_of(&function_set)
                .has_type_definition(ObjectTypeId::BaseObjectType)
                .insert(address_space),
            &id,
        )?;
    }

    let controller = node_id(reader, DeviceNode::TemperatureController);
    add_variable(
        address_space,
        reader,
        DeviceNode::TemperatureCurrentValue,
        &controller,
        DataTypeId::Double,
        Variant::from(AMBIENT_TEMPERATURE),
    )?;
    add_variable(
        address_space,
        reader,
        DeviceNode::TemperatureTargetValue,
        &controller,
        DataTypeId::Double,
        Variant::from(DEFAULT_TARGET_TEMPERATURE),
    )?;
    add_variable(
        address_space,
        reader,
        DeviceNode::TemperatureIsEnabled,
        &controller,
        DataTypeId::Boolean,
        Variant::from(true),
    )?;

    let sensor = node_id(reader, DeviceNode::LuminescenceSensor);
    add_variable(
        address_space,
        reader,
        DeviceNode::LuminescenceReadings,
        &sensor,
        DataTypeId::Double,
        Variant::from(vec![0.0_f64; WELLS]),
    )?;

    tracing::info!(
        "Loaded device model: DI namespace ns={}, reader namespace ns={}",
        di,
        reader
    );

    Ok(di)
}

fn node_id(reader_namespace: u16, node: DeviceNode) -> NodeId {
    NodeId::new(reader_namespace, node.numeric_id())
}

fn add_variable(
    address_space: &mut AddressSpace,
    reader: u16,
    node: DeviceNode,
    parent: &NodeId,
    data_type: DataTypeId,
    value: Variant,
) -> Result<(), StartupError> {
    let id = node_id(reader, node);
    let is_array = matches!(value, Variant::Array(_));
    let mut builder = VariableBuilder::new(&id, QualifiedName::new(reader, node.browse_name()), node.browse_name())
        .component_of(parent)
        .data_type(data_type)
        .has_type_definition(VariableTypeId::BaseDataVariableType)
        .value(value);
    if is_array {
        builder = builder.value_rank(1);
    }
    insert(builder.insert(address_space), &id)
}

fn insert(inserted: bool, id: &NodeId) -> Result<(), StartupError> {
    if inserted {
        Ok(())
    } else {
        Err(StartupError::Namespace(format!("node {} could not be inserted", id)))
    }
}
