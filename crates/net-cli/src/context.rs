use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ncif_apply::{AuditSink, DeviceLocks, EngineContext, LogFacade, ReadEngine, TransactionalApplier};
use ncif_config::{PayloadEncoder, ResponseDecoder, Settings};

/// Settings and engines shared by the commands
#[derive(Debug, Clone)]
pub struct CliContext {
    pub settings: Settings,
    pub engine: EngineContext,
    pub device_locks: Arc<DeviceLocks>,
}

impl CliContext {
    /// Load settings from `config` and the environment.
    pub fn bootstrap(config: Option<&Path>) -> Result<Arc<Self>> {
        let settings = Settings::load(config).with_context(|| match config {
            Some(path) => format!("Failed to load settings from {}", path.display()),
            None => "Failed to load settings from the environment".to_string(),
        })?;
        Ok(Arc::new(Self::from_settings(settings)))
    }

    pub fn from_settings(settings: Settings) -> Self {
        let engine = EngineContext::for_locale(Arc::new(LogFacade), &settings.locale);
        Self {
            settings,
            engine,
            device_locks: Arc::new(DeviceLocks::new()),
        }
    }

    /// Use `engine` for logging instead of the `log` facade.
    pub fn with_engine_context(mut self, engine: EngineContext) -> Self {
        self.engine = engine;
        self
    }

    pub fn read_engine(&self) -> Result<ReadEngine> {
        let decoder = ResponseDecoder::new(self.settings.projection_path()?);
        let mut engine = ReadEngine::new(decoder).with_context(self.engine.clone());
        if let Some(dir) = &self.settings.audit_dir {
            engine = engine.with_audit(AuditSink::new(dir.clone()));
        }
        Ok(engine)
    }

    pub fn applier(&self) -> Result<TransactionalApplier> {
        let encoder = PayloadEncoder::new(self.settings.encoder_options()?);
        Ok(TransactionalApplier::new(encoder)
            .with_device_locks(self.device_locks.clone())
            .with_context(self.engine.clone()))
    }
}
