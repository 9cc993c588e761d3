//! Desired state encoding into edit-config payloads

use serde_json::{Map, Value};

use ncif_core::{ConfigObject, ConfigSet, EncodeError};

use crate::schema::{
    DocumentPath, EncoderOptions, ADDRESS, ADDRESSES, ADDRESS_VALUE, DESCRIPTION, INTERFACE_NAME,
    IPV4, NETMASK, XMLNS,
};
use crate::tree;

/// Builds namespace qualified edit-config payloads
#[derive(Debug, Clone, Default)]
pub struct PayloadEncoder {
    options: EncoderOptions,
}

impl PayloadEncoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Encode `desired` as an XML document ready for edit-config.
    pub fn encode(&self, desired: &ConfigSet) -> Result<String, EncodeError> {
        let tree = self.encode_tree(desired)?;
        tree::to_xml(&tree)
    }

    /// Build the payload tree without serializing it.
    pub fn encode_tree(&self, desired: &ConfigSet) -> Result<Value, EncodeError> {
        if desired.is_empty() && self.options.require_non_empty {
            return Err(EncodeError::EmptyConfigSet);
        }

        let target = &self.options.target;
        if target.parents().is_empty() {
            return Err(EncodeError::Serialize {
                reason: format!("payload path {} has no container element", target),
            });
        }

        let objects: Vec<Value> = desired
            .iter()
            .map(|object| self.encode_object(object))
            .collect();

        let mut node = Value::Array(objects);
        let mut name = target.leaf().to_string();

        // Wrap from the innermost container outwards; the namespace goes on
        // the container holding the object list, once.
        for (depth, segment) in target.parents().iter().enumerate().rev() {
            let mut container = Map::new();
            if depth + 1 == target.parents().len() {
                container.insert(XMLNS.to_string(), Value::String(self.options.namespace.clone()));
            }
            container.insert(name, node);
            node = Value::Object(container);
            name = segment.clone();
        }

        let mut root = Map::new();
        root.insert(name, node);
        Ok(Value::Object(root))
    }

    fn encode_object(&self, object: &ConfigObject) -> Value {
        let mut fields = Map::new();
        fields.insert(INTERFACE_NAME.to_string(), Value::String(object.key.clone()));

        if let Some(description) = &object.description {
            fields.insert(DESCRIPTION.to_string(), Value::String(description.clone()));
        }

        if let Some(address) = &object.address {
            let mut entry = Map::new();
            entry.insert(
                ADDRESS_VALUE.to_string(),
                Value::String(address.ipv4_address.clone()),
            );
            entry.insert(NETMASK.to_string(), Value::String(address.netmask.clone()));

            let mut addresses = Map::new();
            if let Some(namespace) = &self.options.address_namespace {
                addresses.insert(XMLNS.to_string(), Value::String(namespace.clone()));
            }
            addresses.insert(ADDRESS.to_string(), Value::Object(entry));

            let mut ipv4 = Map::new();
            ipv4.insert(ADDRESSES.to_string(), Value::Object(addresses));
            fields.insert(IPV4.to_string(), Value::Object(ipv4));
        }

        Value::Object(fields)
    }
}

/// Encode `desired` under `target` with `namespace` on the object container.
pub fn encode(
    desired: &ConfigSet,
    namespace: &str,
    target: &DocumentPath,
) -> Result<String, EncodeError> {
    PayloadEncoder::new(EncoderOptions::new(namespace).with_target(target.clone())).encode(desired)
}
