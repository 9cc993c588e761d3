//! Mapping of session, decode and local failures onto [`ErrorKind`]

use ncif_shared_types::{ErrorKind, TransactionState};

use crate::error::{
    ApplyError, ApplyErrorKind, ConfigError, DecodeError, EncodeError, NetconfError, SessionError,
};

impl From<ApplyErrorKind> for ErrorKind {
    fn from(kind: ApplyErrorKind) -> Self {
        match kind {
            ApplyErrorKind::LockFailed => ErrorKind::LockFailed,
            ApplyErrorKind::EditFailed => ErrorKind::EditFailed,
            ApplyErrorKind::ValidateFailed => ErrorKind::ValidateFailed,
            ApplyErrorKind::CommitFailed => ErrorKind::CommitFailed,
        }
    }
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            DecodeError::ProjectionMissing { .. } => ErrorKind::ProjectionMissing,
        }
    }
}

impl NetconfError {
    /// Stable classification callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetconfError::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            NetconfError::TransportUnreachable { .. } => ErrorKind::TransportUnreachable,
            NetconfError::Rejected { .. } => ErrorKind::RpcRejected,
            NetconfError::Decode(err) => err.kind(),
            NetconfError::Encode(EncodeError::EmptyConfigSet) => ErrorKind::EmptyConfigSet,
            NetconfError::Encode(EncodeError::Serialize { .. }) => ErrorKind::MalformedDocument,
            NetconfError::Apply(err) => err.kind.into(),
            NetconfError::Configuration(_) => ErrorKind::Configuration,
            NetconfError::Io(_) => ErrorKind::Io,
            NetconfError::Serialization(_) => ErrorKind::MalformedDocument,
        }
    }

    /// Classify a failure raised while connecting or reading.
    pub fn from_session(host: &str, operation: &str, err: SessionError) -> Self {
        match err {
            SessionError::Authentication(message) => NetconfError::AuthenticationFailed {
                host: host.to_string(),
                message,
            },
            SessionError::Transport(message) => NetconfError::TransportUnreachable {
                host: host.to_string(),
                message,
            },
            SessionError::Timeout(after) => NetconfError::TransportUnreachable {
                host: host.to_string(),
                message: format!("{} timed out after {:?}", operation, after),
            },
            SessionError::Protocol(reason) => {
                NetconfError::Decode(DecodeError::MalformedDocument { reason })
            }
            SessionError::Rejected { operation, message } => NetconfError::Rejected {
                host: host.to_string(),
                operation,
                message,
            },
        }
    }

    /// Classify a failure raised by a transaction step.
    pub fn from_transaction(
        host: &str,
        kind: ApplyErrorKind,
        last_state: TransactionState,
        cause: SessionError,
    ) -> Self {
        NetconfError::Apply(ApplyError {
            host: host.to_string(),
            kind,
            last_state,
            cause,
        })
    }

    /// Host the failure relates to, when known
    pub fn host(&self) -> Option<&str> {
        match self {
            NetconfError::AuthenticationFailed { host, .. }
            | NetconfError::TransportUnreachable { host, .. }
            | NetconfError::Rejected { host, .. } => Some(host),
            NetconfError::Apply(err) => Some(&err.host),
            _ => None,
        }
    }
}

impl From<ncif_shared_types::SharedTypeError> for NetconfError {
    fn from(err: ncif_shared_types::SharedTypeError) -> Self {
        use ncif_shared_types::SharedTypeError;

        match err {
            SharedTypeError::DuplicateKey(key) => NetconfError::Configuration(ConfigError::InvalidValue {
                field: "key".to_string(),
                value: format!("{} (duplicate)", key),
            }),
            SharedTypeError::InvalidValue { field, value } => {
                NetconfError::Configuration(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value,
                })
            }
            SharedTypeError::Unsupported(value) => {
                NetconfError::Configuration(ConfigError::InvalidValue {
                    field: "unsupported".to_string(),
                    value,
                })
            }
        }
    }
}
