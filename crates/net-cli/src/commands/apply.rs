//! Apply command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ncif_apply::Connector;
use ncif_config::{load_desired_state, Settings};
use ncif_core::{ConfigSet, TransactionOutcome};
use ncif_session::SshConnector;

use crate::context::CliContext;

/// Apply command implementation
pub struct ApplyCommand {
    context: Arc<CliContext>,
}

impl ApplyCommand {
    /// Create new apply command
    pub fn new(context: Arc<CliContext>) -> Self {
        Self { context }
    }

    /// Execute apply command.
    ///
    /// Returns whether the change was committed. A dry run only prints the
    /// payload and counts as committed.
    pub async fn execute(&self, state_file: Option<&Path>, dry_run: bool) -> Result<bool> {
        let desired = self.desired_state(state_file).await?;

        if dry_run {
            println!("{}", self.payload(&desired)?);
            println!(
                "Dry-run completed - {} interfaces would be applied to {}",
                desired.len(),
                self.context.settings.host
            );
            return Ok(true);
        }

        let connector = SshConnector::from_settings(&self.context.settings);
        let outcome = self.apply(&connector, &desired).await?;
        println!("{}", render_outcome(&outcome));
        Ok(outcome.committed)
    }

    /// Load desired state from `state_file` or the configured state file
    pub async fn desired_state(&self, state_file: Option<&Path>) -> Result<ConfigSet> {
        let path = match state_file {
            Some(path) => path.to_path_buf(),
            None => Settings::require_path(&self.context.settings.state_file, "state_file")?.clone(),
        };
        load_desired_state(&path)
            .await
            .with_context(|| format!("Failed to load desired state: {}", path.display()))
    }

    /// Encoded edit-config payload for `desired`
    pub fn payload(&self, desired: &ConfigSet) -> Result<String> {
        let applier = self.context.applier()?;
        applier
            .encoder()
            .encode(desired)
            .context("Failed to encode desired state")
    }

    /// Run one transaction through `connector`
    pub async fn apply<C: Connector>(
        &self,
        connector: &C,
        desired: &ConfigSet,
    ) -> Result<TransactionOutcome> {
        let host = &self.context.settings.host;
        let applier = self.context.applier()?;

        let session = connector
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", host))?;
        let result = applier.apply(desired, &session).await;

        if let Err(e) = connector.disconnect(session).await {
            log::warn!("Failed to close session with {}: {}", host, e);
        }

        result.with_context(|| format!("Transaction on {} aborted", host))
    }
}

/// Summary printed after a transaction
pub fn render_outcome(outcome: &TransactionOutcome) -> String {
    let mut lines = Vec::new();
    if outcome.committed {
        lines.push(format!(
            "✓ Committed {} interfaces on {} ({}, {} ms)",
            outcome.applied.len(),
            outcome.host,
            outcome.transaction_id,
            outcome.duration_ms
        ));
    } else {
        let reason = outcome
            .failure_reason
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "rejected".to_string());
        lines.push(format!(
            "✗ Discarded changes on {} ({}): {}",
            outcome.host, outcome.transaction_id, reason
        ));
        for rejection in &outcome.rejections {
            lines.push(format!("  - {}", rejection));
        }
    }
    lines.join("\n")
}
