//! The boundary between the simulation and the variable store it publishes to.
//!
//! The sensor loop only ever writes through [`VariableSink`]; it never reads
//! back from the store and never sees the store's concrete type.

use std::collections::HashMap;
use std::fmt;

use crate::error::{ResolutionError, WriteError};

/// Stable address of a variable in the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressableKey {
    pub namespace_index: u16,
    pub numeric_id: u32,
}

impl AddressableKey {
    pub const fn new(namespace_index: u16, numeric_id: u32) -> Self {
        Self {
            namespace_index,
            numeric_id,
        }
    }
}

impl fmt::Display for AddressableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};i={}", self.namespace_index, self.numeric_id)
    }
}

/// A value handed to the sink. Not retained by the publisher.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishedValue {
    Scalar(f64),
    Array(Vec<f64>),
    Flag(bool),
}

pub trait VariableSink: Send + Sync {
    /// Replace the value reported for `key`. Must be safe to call while
    /// other parties read the same key.
    fn write_value(&self, key: &AddressableKey, value: PublishedValue) -> Result<(), WriteError>;

    /// Resolve a numeric identifier inside the namespace named by `namespace_uri`.
    fn resolve_key(&self, namespace_uri: &str, numeric_id: u32) -> Result<AddressableKey, ResolutionError>;
}

impl<S: VariableSink + ?Sized> VariableSink for std::sync::Arc<S> {
    fn write_value(&self, key: &AddressableKey, value: PublishedValue) -> Result<(), WriteError> {
        (**self).write_value(key, value)
    }

    fn resolve_key(&self, namespace_uri: &str, numeric_id: u32) -> Result<AddressableKey, ResolutionError> {
        (**self).resolve_key(namespace_uri, numeric_id)
    }
}

/// Nodes of the luminescence reader's function set that the host addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceNode {
    Cover,
    Injector1,
    Injector2,
    Injector3,
    LuminescenceSensor,
    LuminescenceReadings,
    ShakerController,
    TemperatureController,
    TemperatureCurrentValue,
    TemperatureTargetValue,
    TemperatureIsEnabled,
    WastePump,
}

impl DeviceNode {
    pub const ALL: [DeviceNode; 12] = [
        DeviceNode::Cover,
        DeviceNode::Injector1,
        DeviceNode::Injector2,
        DeviceNode::Injector3,
        DeviceNode::LuminescenceSensor,
        DeviceNode::LuminescenceReadings,
        DeviceNode::ShakerController,
        DeviceNode::TemperatureController,
        DeviceNode::TemperatureCurrentValue,
        DeviceNode::TemperatureTargetValue,
        DeviceNode::TemperatureIsEnabled,
        DeviceNode::WastePump,
    ];

    /// Numeric identifier inside the LuminescenceReader namespace.
    pub const fn numeric_id(self) -> u32 {
        match self {
            DeviceNode::Cover => 5049,
            DeviceNode::Injector1 => 5051,
            DeviceNode::Injector2 => 5052,
            DeviceNode::Injector3 => 5053,
            DeviceNode::LuminescenceSensor => 5054,
            DeviceNode::ShakerController => 5055,
            DeviceNode::TemperatureController => 5056,
            DeviceNode::WastePump => 5057,
            DeviceNode::TemperatureCurrentValue => 6177,
            DeviceNode::TemperatureTargetValue => 6178,
            DeviceNode::TemperatureIsEnabled => 6179,
            DeviceNode::LuminescenceReadings => 6180,
        }
    }

    pub const fn browse_name(self) -> &'static str {
        match self {
            DeviceNode::Cover => "Cover",
            DeviceNode::Injector1 => "Injector1",
            DeviceNode::Injector2 => "Injector2",
            DeviceNode::Injector3 => "Injector3",
            DeviceNode::LuminescenceSensor => "LuminescenceSensor",
            DeviceNode::LuminescenceReadings => "Readings",
            DeviceNode::ShakerController => "ShakerController",
            DeviceNode::TemperatureController => "TemperatureController",
            DeviceNode::TemperatureCurrentValue => "CurrentValue",
            DeviceNode::TemperatureTargetValue => "TargetValue",
            DeviceNode::TemperatureIsEnabled => "IsEnabled",
            DeviceNode::WastePump => "WastePump",
        }
    }
}

/// Resolution table built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct NodeTable {
    keys: HashMap<DeviceNode, AddressableKey>,
}

impl NodeTable {
    /// Resolve every [`DeviceNode`] in `namespace_uri`. Stops at the first failure.
    pub fn resolve<S: VariableSink + ?Sized>(sink: &S, namespace_uri: &str) -> Result<Self, ResolutionError> {
        let mut keys = HashMap::with_capacity(DeviceNode::ALL.len());
        for node in DeviceNode::ALL {
            let key = sink.resolve_key(namespace_uri, node.numeric_id())?;
            tracing::debug!("Resolved {:?} to {}", node, key);
            keys.insert(node, key);
        }
        Ok(Self { keys })
    }

    pub fn key(&self, node: DeviceNode) -> AddressableKey {
        // every variant is inserted by `resolve`
        self.keys[&node]
    }
}
