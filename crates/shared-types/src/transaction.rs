use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interface::ConfigSet;
use crate::kind::ErrorKind;

/// States of one transactional apply against the candidate datastore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// Nothing has been sent to the device yet
    Idle,
    /// Candidate datastore lock is held
    Locked,
    /// Edit submitted to the candidate datastore
    Edited,
    /// Validation requested for the staged change
    Validated,
    /// Staged change promoted to running
    Committed,
    /// Staged change abandoned
    Discarded,
    /// A step failed outright; compensation has run
    Aborted,
    /// Candidate lock released
    Released,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Discarded | TransactionState::Aborted
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of an apply that ran to commit or discard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// Transaction ID
    pub transaction_id: String,
    /// Device the transaction ran against
    pub host: String,
    /// Desired state that was sent
    pub applied: ConfigSet,
    /// Whether the change reached the running datastore
    pub committed: bool,
    /// Terminal state reached before the lock was released
    pub final_state: TransactionState,
    /// Why the change was not committed
    pub failure_reason: Option<ErrorKind>,
    /// Error messages reported by the device for a rejected edit or validation
    #[serde(default)]
    pub rejections: Vec<String>,
    /// Time taken (in milliseconds)
    pub duration_ms: u64,
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}
