//! Desired state and filter sources

use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::fs;

use ncif_core::{ConfigError, ConfigObject, ConfigSet, Filter, Ipv4Address, NetconfError, Result};

/// Top level of a desired state file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub interfaces: IndexMap<String, Option<InterfaceState>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceState {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ipv4: Option<Ipv4State>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ipv4State {
    pub addresses: AddressesState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressesState {
    pub address: AddressState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressState {
    pub address: String,
    pub netmask: String,
}

impl StateFile {
    /// Convert into a desired [`ConfigSet`], keeping file order.
    pub fn into_config_set(self) -> Result<ConfigSet> {
        let mut set = ConfigSet::empty();
        for (key, state) in self.interfaces {
            let state = state.unwrap_or_default();
            set.push(ConfigObject {
                key,
                description: state.description,
                address: state.ipv4.map(|ipv4| {
                    Ipv4Address::new(ipv4.addresses.address.address, ipv4.addresses.address.netmask)
                }),
            })?;
        }
        Ok(set)
    }
}

impl From<&ConfigSet> for StateFile {
    fn from(set: &ConfigSet) -> Self {
        let interfaces = set
            .iter()
            .map(|object| {
                let state = InterfaceState {
                    description: object.description.clone(),
                    ipv4: object.address.as_ref().map(|address| Ipv4State {
                        addresses: AddressesState {
                            address: AddressState {
                                address: address.ipv4_address.clone(),
                                netmask: address.netmask.clone(),
                            },
                        },
                    }),
                };
                (object.key.clone(), Some(state))
            })
            .collect();
        Self { interfaces }
    }
}

/// Parse desired state YAML. `origin` names the source in errors.
pub fn parse_desired_state(content: &str, origin: &str) -> Result<ConfigSet> {
    let file: StateFile = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    file.into_config_set()
}

/// Load desired state from a YAML file.
pub async fn load_desired_state(path: impl AsRef<Path>) -> Result<ConfigSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await?;
    let set = parse_desired_state(&content, &path.display().to_string())?;
    debug!("Loaded {} desired interfaces from {}", set.len(), path.display());
    Ok(set)
}

/// Load the subtree filter document once.
pub async fn load_filter(path: impl AsRef<Path>) -> Result<Filter> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Err(NetconfError::Configuration(ConfigError::InvalidValue {
            field: "filter_file".to_string(),
            value: format!("{} is empty", path.display()),
        }));
    }
    Ok(Filter::new(content.trim()))
}
