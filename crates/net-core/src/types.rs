//! Core model types

pub use ncif_shared_types::{
    ConfigObject, ConfigSet, Datastore, ErrorKind, Filter, Ipv4Address, TransactionOutcome,
    TransactionState,
};

/// Default namespace of the interface IPv4 address configuration model
pub const DEFAULT_NAMESPACE: &str = "http://cisco.com/ns/yang/Cisco-IOS-XR-um-if-ip-address-cfg";

/// Base namespace of the NETCONF protocol envelope
pub const NETCONF_BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
