//! Element layout of the interface IPv4 address model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ncif_core::{ConfigError, DEFAULT_NAMESPACE};

/// Element holding the object key
pub const INTERFACE_NAME: &str = "interface-name";
pub const DESCRIPTION: &str = "description";
pub const IPV4: &str = "ipv4";
pub const ADDRESSES: &str = "addresses";
pub const ADDRESS: &str = "address";
/// Leaf carrying the IPv4 literal inside `address`
pub const ADDRESS_VALUE: &str = "address";
pub const NETMASK: &str = "netmask";

/// Namespace attribute key in the document tree
pub const XMLNS: &str = "@xmlns";

/// Slash separated list of element names, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(Vec<String>);

impl DocumentPath {
    pub fn new<I, S>(segments: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "document path".to_string(),
                value: segments.join("/"),
            });
        }
        Ok(Self(segments))
    }

    /// `data/interfaces/interface`, where read replies carry interfaces
    pub fn default_projection() -> Self {
        Self(vec![
            "data".to_string(),
            "interfaces".to_string(),
            "interface".to_string(),
        ])
    }

    /// `config/interfaces/interface`, the edit-config payload layout
    pub fn default_target() -> Self {
        Self(vec![
            "config".to_string(),
            "interfaces".to_string(),
            "interface".to_string(),
        ])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Element name of the objects themselves
    pub fn leaf(&self) -> &str {
        // non-empty by construction
        &self.0[self.0.len() - 1]
    }

    /// Containers above the leaf, outermost first
    pub fn parents(&self) -> &[String] {
        &self.0[..self.0.len() - 1]
    }

    /// Path rendered up to and including `depth` segments
    pub fn prefix(&self, depth: usize) -> String {
        self.0[..depth.min(self.0.len())].join("/")
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for DocumentPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim_matches('/').split('/'))
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.to_string()
    }
}

/// How desired state is laid out in an edit-config payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderOptions {
    /// Namespace attached once to the container directly above the objects
    pub namespace: String,
    /// Namespace attached to each `addresses` container, if the model needs it
    pub address_namespace: Option<String>,
    /// Payload path, `config/interfaces/interface` by default
    pub target: DocumentPath,
    /// Reject empty desired state instead of sending an empty list
    pub require_non_empty: bool,
}

impl EncoderOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            address_namespace: None,
            target: DocumentPath::default_target(),
            require_non_empty: false,
        }
    }

    pub fn with_address_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.address_namespace = Some(namespace.into());
        self
    }

    pub fn with_target(mut self, target: DocumentPath) -> Self {
        self.target = target;
        self
    }

    pub fn require_non_empty(mut self, require: bool) -> Self {
        self.require_non_empty = require;
        self
    }
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE).with_address_namespace(DEFAULT_NAMESPACE)
    }
}
