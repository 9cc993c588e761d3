//! NETCONF interface apply and read engines
//!
//! Transactional configuration apply with lock, validate and commit or
//! discard, plus filtered reads of the running datastore.

pub mod audit;
pub mod context;
pub mod device_lock;
pub mod read;
pub mod session;
pub mod transaction;

#[cfg(test)]
mod tests;

pub use audit::AuditSink;
pub use context::{
    EngineContext, EngineLogger, EngineMessage, EnglishMessages, LogFacade, MessageFormatter,
    NullLogger,
};
pub use device_lock::DeviceLocks;
pub use read::ReadEngine;
pub use session::{Connector, RpcReply, Session};
pub use transaction::TransactionalApplier;
