//! Transactional configuration apply against the candidate datastore

use std::sync::Arc;
use std::time::Instant;

use log::Level;

use ncif_config::PayloadEncoder;
use ncif_core::{
    ApplyErrorKind, ConfigSet, Datastore, ErrorKind, NetconfError, Result, SessionError,
    TransactionOutcome, TransactionState,
};

use crate::context::{EngineContext, EngineMessage};
use crate::device_lock::DeviceLocks;
use crate::session::{RpcReply, Session};

/// Bookkeeping for one apply call
struct Transaction {
    id: String,
    host: String,
    state: TransactionState,
}

/// How a transaction that kept its lock ended
struct Settled {
    state: TransactionState,
    failure_reason: Option<ErrorKind>,
    rejections: Vec<String>,
}

/// Applies desired state with lock, edit, validate and commit or discard
pub struct TransactionalApplier {
    /// Payload encoder for the target model
    encoder: PayloadEncoder,
    /// Serializes transactions per device
    device_locks: Arc<DeviceLocks>,
    /// Logger and message formatter
    context: EngineContext,
}

impl TransactionalApplier {
    pub fn new(encoder: PayloadEncoder) -> Self {
        Self {
            encoder,
            device_locks: Arc::new(DeviceLocks::new()),
            context: EngineContext::default(),
        }
    }

    /// Share a device lock registry with other appliers.
    pub fn with_device_locks(mut self, device_locks: Arc<DeviceLocks>) -> Self {
        self.device_locks = device_locks;
        self
    }

    pub fn with_context(mut self, context: EngineContext) -> Self {
        self.context = context;
        self
    }

    pub fn encoder(&self) -> &PayloadEncoder {
        &self.encoder
    }

    /// Apply `desired` through `session`.
    ///
    /// Returns an outcome when the transaction reached commit or discard.
    /// Returns `NetconfError::Apply` when a step failed outright; by then
    /// the staged change has been discarded (when past the lock) and the
    /// candidate lock released. The candidate is never left locked.
    pub async fn apply<S>(&self, desired: &ConfigSet, session: &S) -> Result<TransactionOutcome>
    where
        S: Session + ?Sized,
    {
        let payload = self.encoder.encode(desired)?;
        let host = session.host();

        let _device_guard = self.device_locks.acquire(&host).await;
        let started = Instant::now();

        let mut transaction = Transaction {
            id: generate_transaction_id(),
            host,
            state: TransactionState::Idle,
        };

        if let Err(err) = session.lock(Datastore::Candidate).await {
            self.transition(&mut transaction, TransactionState::Aborted);
            return Err(NetconfError::from_transaction(
                &transaction.host,
                ApplyErrorKind::LockFailed,
                TransactionState::Idle,
                err,
            ));
        }
        self.transition(&mut transaction, TransactionState::Locked);

        let settled = self.run_locked(&mut transaction, session, &payload).await;

        if let Err(err) = session.unlock(Datastore::Candidate).await {
            self.cleanup_failed(&transaction, "unlock", &err);
        }
        self.transition(&mut transaction, TransactionState::Released);

        let settled = settled?;
        Ok(TransactionOutcome {
            transaction_id: transaction.id,
            host: transaction.host,
            applied: desired.clone(),
            committed: settled.state == TransactionState::Committed,
            final_state: settled.state,
            failure_reason: settled.failure_reason,
            rejections: settled.rejections,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Edit, validate and settle while the candidate lock is held
    async fn run_locked<S>(
        &self,
        transaction: &mut Transaction,
        session: &S,
        payload: &str,
    ) -> Result<Settled>
    where
        S: Session + ?Sized,
    {
        let edit = match session.edit_config(Datastore::Candidate, payload).await {
            Ok(reply) => reply,
            Err(err) => {
                return Err(self
                    .abort(transaction, session, ApplyErrorKind::EditFailed, err)
                    .await)
            }
        };
        self.transition(transaction, TransactionState::Edited);

        let validate = match session.validate(Datastore::Candidate).await {
            Ok(reply) => reply,
            Err(err) => {
                return Err(self
                    .abort(transaction, session, ApplyErrorKind::ValidateFailed, err)
                    .await)
            }
        };
        self.transition(transaction, TransactionState::Validated);

        if edit.ok && validate.ok {
            if let Err(err) = session.commit().await {
                return Err(self
                    .abort(transaction, session, ApplyErrorKind::CommitFailed, err)
                    .await);
            }
            self.transition(transaction, TransactionState::Committed);
            return Ok(Settled {
                state: TransactionState::Committed,
                failure_reason: None,
                rejections: Vec::new(),
            });
        }

        let failure_reason = if edit.ok {
            ErrorKind::ValidateFailed
        } else {
            ErrorKind::EditFailed
        };
        let rejections = self.collect_rejections(transaction, &edit, &validate);

        if let Err(err) = session.discard().await {
            self.cleanup_failed(transaction, "discard-changes", &err);
        }
        self.transition(transaction, TransactionState::Discarded);

        Ok(Settled {
            state: TransactionState::Discarded,
            failure_reason: Some(failure_reason),
            rejections,
        })
    }

    /// Discard the staged change after a failed step and build the error
    async fn abort<S>(
        &self,
        transaction: &mut Transaction,
        session: &S,
        kind: ApplyErrorKind,
        cause: SessionError,
    ) -> NetconfError
    where
        S: Session + ?Sized,
    {
        let last_state = transaction.state;
        if let Err(err) = session.discard().await {
            self.cleanup_failed(transaction, "discard-changes", &err);
        }
        self.transition(transaction, TransactionState::Aborted);
        NetconfError::from_transaction(&transaction.host, kind, last_state, cause)
    }

    fn collect_rejections(
        &self,
        transaction: &Transaction,
        edit: &RpcReply,
        validate: &RpcReply,
    ) -> Vec<String> {
        let mut rejections = Vec::new();
        for (operation, reply) in [("edit-config", edit), ("validate", validate)] {
            if reply.ok {
                continue;
            }
            self.context.report(
                Level::Warn,
                EngineMessage::ChangeRejected {
                    transaction_id: transaction.id.clone(),
                    host: transaction.host.clone(),
                    operation: operation.to_string(),
                    errors: reply.errors.clone(),
                },
            );
            rejections.extend(reply.errors.iter().cloned());
        }
        rejections
    }

    fn transition(&self, transaction: &mut Transaction, to: TransactionState) {
        let level = match to {
            TransactionState::Committed | TransactionState::Discarded => Level::Info,
            TransactionState::Aborted => Level::Error,
            _ => Level::Debug,
        };
        self.context.report(
            level,
            EngineMessage::StateChanged {
                transaction_id: transaction.id.clone(),
                host: transaction.host.clone(),
                from: transaction.state,
                to,
            },
        );
        transaction.state = to;
    }

    fn cleanup_failed(&self, transaction: &Transaction, operation: &str, err: &SessionError) {
        self.context.report(
            Level::Error,
            EngineMessage::CleanupFailed {
                transaction_id: transaction.id.clone(),
                host: transaction.host.clone(),
                operation: operation.to_string(),
                error: err.to_string(),
            },
        );
    }
}

impl Default for TransactionalApplier {
    fn default() -> Self {
        Self::new(PayloadEncoder::default())
    }
}

/// Generate unique transaction ID
fn generate_transaction_id() -> String {
    format!("txn_{}", chrono::Utc::now().timestamp_millis())
}
