//! Filtered reads of the running datastore

use log::Level;

use ncif_config::ResponseDecoder;
use ncif_core::{ConfigSet, Datastore, Filter, NetconfError, Result};

use crate::audit::AuditSink;
use crate::context::{EngineContext, EngineMessage};
use crate::session::Session;

/// Reads and decodes the interface subset selected by a filter
pub struct ReadEngine {
    decoder: ResponseDecoder,
    audit: Option<AuditSink>,
    context: EngineContext,
}

impl ReadEngine {
    pub fn new(decoder: ResponseDecoder) -> Self {
        Self {
            decoder,
            audit: None,
            context: EngineContext::default(),
        }
    }

    /// Store every raw reply through `audit`.
    pub fn with_audit(mut self, audit: AuditSink) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_context(mut self, context: EngineContext) -> Self {
        self.context = context;
        self
    }

    /// Run one get-config on the running datastore and decode the reply.
    ///
    /// The raw reply is stored before decoding so replies that fail to
    /// decode can still be inspected. Storage failures are only reported.
    pub async fn read<S>(&self, filter: &Filter, session: &S) -> Result<ConfigSet>
    where
        S: Session + ?Sized,
    {
        let host = session.host();
        let raw = session
            .get_config(Datastore::Running, filter)
            .await
            .map_err(|err| NetconfError::from_session(&host, "get-config", err))?;

        if let Some(audit) = &self.audit {
            match audit.record(&host, &raw).await {
                Ok(path) => self.context.report(
                    Level::Debug,
                    EngineMessage::AuditWritten {
                        host: host.clone(),
                        path,
                    },
                ),
                Err(err) => self.context.report(
                    Level::Warn,
                    EngineMessage::AuditFailed {
                        host: host.clone(),
                        error: err.to_string(),
                    },
                ),
            }
        }

        let interfaces = self.decoder.decode(&raw)?;

        for object in &interfaces {
            self.context.report(
                Level::Debug,
                EngineMessage::InterfaceRead {
                    host: host.clone(),
                    key: object.key.clone(),
                    description: object.description.clone(),
                    address: object
                        .address
                        .as_ref()
                        .map(|a| format!("{} {}", a.ipv4_address, a.netmask)),
                },
            );
        }
        self.context.report(
            Level::Info,
            EngineMessage::ReadCompleted {
                host,
                count: interfaces.len(),
            },
        );

        Ok(interfaces)
    }
}

impl Default for ReadEngine {
    fn default() -> Self {
        Self::new(ResponseDecoder::default())
    }
}
