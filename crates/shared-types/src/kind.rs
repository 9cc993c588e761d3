use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed failure taxonomy surfaced to callers of the read and apply engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    AuthenticationFailed,
    TransportUnreachable,
    MalformedDocument,
    ProjectionMissing,
    LockFailed,
    EditFailed,
    ValidateFailed,
    CommitFailed,
    EmptyConfigSet,
    /// Device answered an rpc outside a transaction with rpc-error.
    RpcRejected,
    /// Local settings or input files are unusable.
    Configuration,
    /// Local filesystem failure.
    Io,
}

impl ErrorKind {
    /// Whether the failure happened inside a transaction after the lock step.
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            ErrorKind::LockFailed
                | ErrorKind::EditFailed
                | ErrorKind::ValidateFailed
                | ErrorKind::CommitFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailed => "authentication-failed",
            ErrorKind::TransportUnreachable => "transport-unreachable",
            ErrorKind::MalformedDocument => "malformed-document",
            ErrorKind::ProjectionMissing => "projection-missing",
            ErrorKind::LockFailed => "lock-failed",
            ErrorKind::EditFailed => "edit-failed",
            ErrorKind::ValidateFailed => "validate-failed",
            ErrorKind::CommitFailed => "commit-failed",
            ErrorKind::EmptyConfigSet => "empty-config-set",
            ErrorKind::RpcRejected => "rpc-rejected",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
