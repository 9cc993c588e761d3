//! NETCONF interface management core
//!
//! Error taxonomy and failure classification shared by the read and apply
//! engines.

pub mod classify;
pub mod error;
pub mod types;

pub use error::{
    ApplyError, ApplyErrorKind, ConfigError, DecodeError, EncodeError, NetconfError, SessionError,
};
pub use types::*;

/// Result type for NETCONF interface operations
pub type Result<T> = std::result::Result<T, NetconfError>;
