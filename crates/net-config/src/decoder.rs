//! Read reply decoding into configuration objects

use serde_json::Value;

use ncif_core::{ConfigObject, ConfigSet, DecodeError, Ipv4Address};

use crate::schema::{
    DocumentPath, ADDRESS, ADDRESSES, ADDRESS_VALUE, DESCRIPTION, INTERFACE_NAME, IPV4, NETMASK,
};
use crate::tree::{self, ATTRIBUTE_PREFIX, TEXT_KEY};

/// Decodes read replies using a fixed projection path
#[derive(Debug, Clone)]
pub struct ResponseDecoder {
    projection: DocumentPath,
}

impl ResponseDecoder {
    pub fn new(projection: DocumentPath) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &DocumentPath {
        &self.projection
    }

    pub fn decode(&self, raw_document: &str) -> Result<ConfigSet, DecodeError> {
        decode(raw_document, &self.projection)
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new(DocumentPath::default_projection())
    }
}

/// Parse a raw reply (XML, or the same tree already rendered as JSON)
pub fn parse_document(raw_document: &str) -> Result<Value, DecodeError> {
    let trimmed = raw_document.trim_start();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| DecodeError::malformed(e.to_string()))
    } else {
        tree::from_xml(trimmed)
    }
}

/// Decode the objects found at `projection` in `raw_document`.
pub fn decode(raw_document: &str, projection: &DocumentPath) -> Result<ConfigSet, DecodeError> {
    let tree = parse_document(raw_document)?;
    decode_tree(&tree, projection)
}

/// Decode from an already parsed tree.
///
/// A missing leaf, or an empty element anywhere along the path, means
/// nothing matched and yields an empty set. A container that is missing
/// from a non-empty parent means the reply is not shaped like the model
/// and is reported as `ProjectionMissing`.
pub fn decode_tree(tree: &Value, projection: &DocumentPath) -> Result<ConfigSet, DecodeError> {
    let parents = projection.parents();
    let mut node = tree;

    for (depth, segment) in parents.iter().enumerate() {
        let container = match node {
            Value::Object(fields) => fields.get(segment.as_str()),
            _ => {
                return Err(DecodeError::malformed(format!(
                    "{} is not a container",
                    projection.prefix(depth)
                )))
            }
        };

        match container {
            None => {
                return Err(DecodeError::ProjectionMissing {
                    path: projection.prefix(depth + 1),
                })
            }
            Some(child) if is_empty_element(child) => return Ok(ConfigSet::empty()),
            Some(child) => node = child,
        }
    }

    let entries = match node {
        Value::Object(fields) => fields.get(projection.leaf()),
        _ => {
            return Err(DecodeError::malformed(format!(
                "{} is not a container",
                projection.prefix(parents.len())
            )))
        }
    };

    let items: Vec<&Value> = match entries {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    let mut set = ConfigSet::empty();
    for item in items {
        let object = decode_object(item)?;
        set.push(object)
            .map_err(|e| DecodeError::malformed(e.to_string()))?;
    }
    Ok(set)
}

fn decode_object(item: &Value) -> Result<ConfigObject, DecodeError> {
    let fields = item
        .as_object()
        .ok_or_else(|| DecodeError::malformed("interface entry is not an element"))?;

    let key = fields
        .get(INTERFACE_NAME)
        .and_then(scalar)
        .ok_or_else(|| DecodeError::malformed(format!("interface entry without {}", INTERFACE_NAME)))?;

    let description = match fields.get(DESCRIPTION) {
        None => None,
        Some(value) if is_empty_element(value) => Some(String::new()),
        Some(value) => Some(scalar(value).ok_or_else(|| {
            DecodeError::malformed(format!("{}: description is not text", key))
        })?),
    };

    let address = match fields
        .get(IPV4)
        .and_then(|ipv4| ipv4.get(ADDRESSES))
        .and_then(|addresses| addresses.get(ADDRESS))
    {
        None | Some(Value::Null) => None,
        // the first entry is the primary address
        Some(Value::Array(entries)) => entries.first().map(|entry| decode_address(&key, entry)).transpose()?,
        Some(entry) => Some(decode_address(&key, entry)?),
    };

    Ok(ConfigObject {
        key,
        description,
        address,
    })
}

fn decode_address(key: &str, entry: &Value) -> Result<Ipv4Address, DecodeError> {
    let field = |name: &str| {
        entry.get(name).and_then(scalar).ok_or_else(|| {
            DecodeError::malformed(format!("{}: address without {}", key, name))
        })
    };
    Ok(Ipv4Address {
        ipv4_address: field(ADDRESS_VALUE)?,
        netmask: field(NETMASK)?,
    })
}

/// An element with neither children nor text, attributes aside
fn is_empty_element(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(fields) => fields.iter().all(|(name, field)| {
            name.starts_with(ATTRIBUTE_PREFIX)
                || (name == TEXT_KEY && field.as_str().map_or(false, |text| text.trim().is_empty()))
        }),
        _ => false,
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(fields) => fields.get(TEXT_KEY).and_then(scalar),
        _ => None,
    }
}
