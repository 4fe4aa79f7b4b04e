use std::sync::Arc;

use opcua::server::prelude::*;
use opcua::sync::RwLock;

use crate::error::{ResolutionError, WriteError};
use crate::sink::{AddressableKey, PublishedValue, VariableSink};

/// Publishes into a live server's address space. Each write takes the
/// address space lock once, so a value is replaced atomically with respect
/// to the server's read path.
#[derive(Clone)]
pub struct AddressSpaceSink {
    address_space: Arc<RwLock<AddressSpace>>,
}

impl AddressSpaceSink {
    pub fn new(address_space: Arc<RwLock<AddressSpace>>) -> Self {
        Self { address_space }
    }
}

fn to_node_id(key: &AddressableKey) -> NodeId {
    NodeId::new(key.namespace_index, key.numeric_id)
}

impl VariableSink for AddressSpaceSink {
    fn write_value(&self, key: &AddressableKey, value: PublishedValue) -> Result<(), WriteError> {
        let variant = match value {
            PublishedValue::Scalar(v) => Variant::from(v),
            PublishedValue::Array(values) => Variant::from(values),
            PublishedValue::Flag(flag) => Variant::from(flag),
        };
        let node_id = to_node_id(key);
        let now = DateTime::now();
        let mut address_space = self.address_space.write();
        if address_space.set_variable_value(node_id.clone(), variant, &now, &now) {
            Ok(())
        } else if address_space.find_node(&node_id).is_some() {
            Err(WriteError::Rejected {
                key: *key,
                reason: "node is not a variable".to_string(),
            })
        } else {
            Err(WriteError::NodeUnavailable(*key))
        }
    }

    fn resolve_key(&self, namespace_uri: &str, numeric_id: u32) -> Result<AddressableKey, ResolutionError> {
        let address_space = self.address_space.read();
        let namespace_index = address_space
            .namespace_index(namespace_uri)
            .ok_or_else(|| ResolutionError::UnknownNamespace(namespace_uri.to_string()))?;
        let key = AddressableKey::new(namespace_index, numeric_id);
        match address_space.find_node(&to_node_id(&key)) {
            Some(_) => Ok(key),
            None => Err(ResolutionError::UnknownNode(key)),
        }
    }
}
