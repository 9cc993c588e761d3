//! Error types for NETCONF interface operations

use std::time::Duration;

use ncif_shared_types::TransactionState;
use thiserror::Error;

/// Main error type for read and apply operations
#[derive(Debug, Error)]
pub enum NetconfError {
    #[error("Authentication failed for {host}: {message}")]
    AuthenticationFailed { host: String, message: String },

    #[error("Cannot reach {host}: {message}")]
    TransportUnreachable { host: String, message: String },

    #[error("{host} rejected {operation}: {message}")]
    Rejected {
        host: String,
        operation: String,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Transaction error: {0}")]
    Apply(#[from] ApplyError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reply document does not have the expected shape
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed document: {reason}")]
    MalformedDocument { reason: String },

    #[error("Projection path {path} not present in reply")]
    ProjectionMissing { path: String },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::MalformedDocument {
            reason: reason.into(),
        }
    }
}

/// Desired state could not be turned into a payload
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Refusing to encode an empty configuration set")]
    EmptyConfigSet,

    #[error("Payload serialization failed: {reason}")]
    Serialize { reason: String },
}

/// Step of the transaction that failed outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyErrorKind {
    LockFailed,
    EditFailed,
    ValidateFailed,
    CommitFailed,
}

impl std::fmt::Display for ApplyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApplyErrorKind::LockFailed => "lock failed",
            ApplyErrorKind::EditFailed => "edit failed",
            ApplyErrorKind::ValidateFailed => "validate failed",
            ApplyErrorKind::CommitFailed => "commit failed",
        };
        f.write_str(name)
    }
}

/// Transaction aborted; compensation and lock release already ran
#[derive(Debug, Error)]
#[error("{kind} on {host} (aborted after {last_state}): {cause}")]
pub struct ApplyError {
    pub host: String,
    pub kind: ApplyErrorKind,
    /// Last state reached before the failing step
    pub last_state: TransactionState,
    #[source]
    pub cause: SessionError,
}

/// Local configuration and input file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to load settings: {0}")]
    Load(String),
}

/// Failures reported by a session implementation
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("{operation} returned rpc-error: {message}")]
    Rejected { operation: String, message: String },
}
