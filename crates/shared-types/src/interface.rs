use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{SharedResult, SharedTypeError};

/// IPv4 address assignment of a configuration object.
///
/// Neither field is checked for being a well formed literal; the device
/// rejects bad values during the validate step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Address {
    pub ipv4_address: String,
    pub netmask: String,
}

impl Ipv4Address {
    pub fn new(ipv4_address: impl Into<String>, netmask: impl Into<String>) -> Self {
        Self {
            ipv4_address: ipv4_address.into(),
            netmask: netmask.into(),
        }
    }
}

/// One managed entity on the device, keyed by interface name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObject {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Ipv4Address>,
}

impl ConfigObject {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: None,
            address: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_address(mut self, address: Ipv4Address) -> Self {
        self.address = Some(address);
        self
    }
}

/// Ordered collection of configuration objects with unique keys.
///
/// Source order is kept so that encoded payloads and decoded replies are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigSet {
    objects: Vec<ConfigObject>,
}

impl ConfigSet {
    pub fn new(objects: Vec<ConfigObject>) -> SharedResult<Self> {
        let mut seen = HashSet::with_capacity(objects.len());
        for object in &objects {
            if !seen.insert(object.key.as_str()) {
                return Err(SharedTypeError::DuplicateKey(object.key.clone()));
            }
        }
        Ok(Self { objects })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: ConfigObject) -> SharedResult<()> {
        if self.get(&object.key).is_some() {
            return Err(SharedTypeError::DuplicateKey(object.key));
        }
        self.objects.push(object);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigObject> {
        self.objects.iter().find(|object| object.key == key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigObject> {
        self.objects.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|object| object.key.as_str())
    }

    pub fn into_inner(self) -> Vec<ConfigObject> {
        self.objects
    }
}

impl<'de> Deserialize<'de> for ConfigSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let objects = Vec::<ConfigObject>::deserialize(deserializer)?;
        ConfigSet::new(objects).map_err(serde::de::Error::custom)
    }
}

impl<'a> IntoIterator for &'a ConfigSet {
    type Item = &'a ConfigObject;
    type IntoIter = std::slice::Iter<'a, ConfigObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

impl IntoIterator for ConfigSet {
    type Item = ConfigObject;
    type IntoIter = std::vec::IntoIter<ConfigObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}
