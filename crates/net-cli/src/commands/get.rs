//! Get command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use ncif_apply::Connector;
use ncif_config::{load_filter, Settings};
use ncif_core::ConfigSet;
use ncif_session::SshConnector;

use crate::context::CliContext;

/// How decoded interfaces are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Get command implementation
pub struct GetCommand {
    context: Arc<CliContext>,
}

impl GetCommand {
    /// Create new get command
    pub fn new(context: Arc<CliContext>) -> Self {
        Self { context }
    }

    /// Execute get command against the configured device
    pub async fn execute(&self, filter_file: Option<&Path>, format: OutputFormat) -> Result<()> {
        let connector = SshConnector::from_settings(&self.context.settings);
        let interfaces = self.fetch(&connector, filter_file).await?;
        println!("{}", render(&interfaces, format)?);
        Ok(())
    }

    /// Read the filtered interface subset through `connector`
    pub async fn fetch<C: Connector>(
        &self,
        connector: &C,
        filter_file: Option<&Path>,
    ) -> Result<ConfigSet> {
        let settings = &self.context.settings;
        let filter_path = match filter_file {
            Some(path) => path.to_path_buf(),
            None => Settings::require_path(&settings.filter_file, "filter_file")?.clone(),
        };
        let filter = load_filter(&filter_path)
            .await
            .with_context(|| format!("Failed to load filter: {}", filter_path.display()))?;
        let engine = self.context.read_engine()?;

        let session = connector
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", settings.host))?;
        let result = engine.read(&filter, &session).await;

        if let Err(e) = connector.disconnect(session).await {
            log::warn!("Failed to close session with {}: {}", settings.host, e);
        }

        result.with_context(|| format!("Failed to read interfaces from {}", settings.host))
    }
}

/// Render `interfaces` for the terminal
pub fn render(interfaces: &ConfigSet, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(interfaces).context("Failed to serialize interfaces")
        }
        OutputFormat::Text => {
            let mut lines = vec![
                format!(
                    "{:<24} {:<30} {:<16} {}",
                    "Interface", "Description", "Address", "Netmask"
                ),
                "-".repeat(86),
            ];
            for object in interfaces {
                let (address, netmask) = match &object.address {
                    Some(address) => (address.ipv4_address.as_str(), address.netmask.as_str()),
                    None => ("-", "-"),
                };
                lines.push(format!(
                    "{:<24} {:<30} {:<16} {}",
                    object.key,
                    object.description.as_deref().unwrap_or("-"),
                    address,
                    netmask
                ));
            }
            if interfaces.is_empty() {
                lines.push("No interfaces matched the filter".to_string());
            }
            Ok(lines.join("\n"))
        }
    }
}
