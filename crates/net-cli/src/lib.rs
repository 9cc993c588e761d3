//! NETCONF interface configuration CLI
//!
//! Reads the interface subset of a device's running configuration and
//! applies desired state through a candidate datastore transaction.

pub mod commands;
pub mod context;
