//! Session protocol seam
//!
//! The engines drive a device through [`Session`]; connection setup,
//! authentication and the wire envelope live behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ncif_core::{Datastore, Filter, SessionError};

/// Reply to an rpc whose failure the engine decides on itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcReply {
    /// `<ok/>` was returned
    pub ok: bool,
    /// `error-message` texts of any `<rpc-error>` elements
    pub errors: Vec<String>,
}

impl RpcReply {
    pub fn ok() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<String>) -> Self {
        Self { ok: false, errors }
    }
}

/// One open protocol session with a device.
///
/// `Err` means the operation itself failed (transport, framing, a refused
/// lock or commit). `edit_config` and `validate` report device side
/// rejection as `Ok(RpcReply { ok: false, .. })` so the caller can choose
/// between commit and discard.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    /// Device identity (host name or address)
    fn host(&self) -> String;

    async fn get_config(
        &self,
        source: Datastore,
        filter: &Filter,
    ) -> Result<String, SessionError>;

    async fn lock(&self, target: Datastore) -> Result<(), SessionError>;

    async fn unlock(&self, target: Datastore) -> Result<(), SessionError>;

    async fn edit_config(
        &self,
        target: Datastore,
        document: &str,
    ) -> Result<RpcReply, SessionError>;

    async fn validate(&self, source: Datastore) -> Result<RpcReply, SessionError>;

    async fn commit(&self) -> Result<(), SessionError>;

    async fn discard(&self) -> Result<(), SessionError>;
}

/// Opens sessions; failures come back already classified.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(&self) -> ncif_core::Result<Self::Session>;

    /// End `session` politely; the default just drops it.
    async fn disconnect(&self, session: Self::Session) -> Result<(), SessionError> {
        drop(session);
        Ok(())
    }
}
