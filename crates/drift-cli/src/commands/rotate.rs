//! Rotate command implementation.
//!
//! Writes a new vault version, patches the workload secret, restarts the
//! deployment, then saves the resulting state and records the outcome.

use std::io::Write;
use std::path::Path;

use drift_engine::{
    AuditLog, AuditSink, EngineConfig, RotationReport, RotationRequest, RotationStatus,
    SecretEngine, StateSnapshot, StepStatus, parse_expiry_date,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::JsonlAuditLog;
use crate::cli::RotateArgs;
use crate::commands::load_state;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the rotate command.
pub struct RotateCommand<'a> {
    state: &'a Path,
    config: &'a EngineConfig,
}

impl<'a> RotateCommand<'a> {
    /// Creates a new rotate command handler.
    #[must_use]
    pub const fn new(state: &'a Path, config: &'a EngineConfig) -> Self {
        Self { state, config }
    }

    /// Executes the rotate command.
    ///
    /// The outcome is printed before a failed rotation is turned into an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be loaded or saved, the audit entry
    /// cannot be written, or the vault update failed.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &RotateArgs,
    ) -> Result<(), CliError> {
        let request = self.request(args);
        let (vault, cluster) = load_state(self.state)?.into_clients();
        let engine = SecretEngine::new(&vault, &cluster, self.config);

        let memory_log;
        let file_log;
        let sink: &dyn AuditSink = if let Some(path) = &args.audit_log {
            file_log = JsonlAuditLog::new(path);
            &file_log
        } else {
            memory_log = AuditLog::new();
            &memory_log
        };

        let report = engine.rotate_and_audit(&request, &args.account, sink)?;
        StateSnapshot::capture(&vault, &cluster).to_file(self.state)?;
        info!(
            secret = %request.vault_secret,
            status = ?report.status(),
            state = %self.state.display(),
            "rotation finished"
        );

        let output = RotateOutput::new(&request, &report);
        format.write(out, &output)?;

        if report.outcome.success {
            Ok(())
        } else {
            Err(CliError::Command(report.outcome.message))
        }
    }

    fn request(&self, args: &RotateArgs) -> RotationRequest {
        let namespace = args
            .namespace
            .clone()
            .unwrap_or_else(|| self.config.namespace.clone());
        let mut request = RotationRequest::new(args.vault_secret.clone(), namespace);

        if let Some(name) = &args.workload_secret {
            request = request.with_workload_secret(name.clone());
        }
        if let Some(name) = &args.deployment {
            request = request.with_deployment(name.clone());
        }
        if let Some(value) = &args.value {
            request = request.with_value(value.clone());
        }
        if let Some(input) = &args.expires {
            match parse_expiry_date(input) {
                Ok(expires_on) => request = request.with_expiry(expires_on),
                Err(e) => warn!(input = %input, error = %e, "ignoring expiry"),
            }
        }
        request
    }
}

// Output types

/// Rotation result as printed.
#[derive(Debug, Clone, Serialize)]
pub struct RotateOutput {
    /// Vault secret that was rotated.
    pub secret: String,
    /// Namespace of the workload side.
    pub namespace: String,
    /// Whether the vault update succeeded.
    pub success: bool,
    /// Overall classification.
    pub status: RotationStatus,
    /// Outcome message.
    pub message: String,
    /// Vault write.
    pub vault: StepStatus,
    /// Workload secret patch.
    pub workload_secret: StepStatus,
    /// Deployment restart.
    pub restart: StepStatus,
}

impl RotateOutput {
    /// Builds the printable form of a rotation.
    #[must_use]
    pub fn new(request: &RotationRequest, report: &RotationReport) -> Self {
        Self {
            secret: request.vault_secret.clone(),
            namespace: request.namespace.clone(),
            success: report.outcome.success,
            status: report.status(),
            message: report.outcome.message.clone(),
            vault: report.vault.clone(),
            workload_secret: report.workload_secret.clone(),
            restart: report.restart.clone(),
        }
    }
}

fn step_label(step: &StepStatus) -> String {
    match step {
        StepStatus::Applied => "applied".to_string(),
        StepStatus::Skipped => "skipped".to_string(),
        StepStatus::Failed(reason) => format!("failed ({reason})"),
    }
}

impl TableDisplay for RotateOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let mark = match self.status {
            RotationStatus::Completed => "✓",
            RotationStatus::Degraded => "!",
            RotationStatus::Failed => "✗",
        };
        writeln!(writer, "{mark} {}", self.message)?;
        writeln!(writer)?;
        writeln!(writer, "Vault:        {}", step_label(&self.vault))?;
        writeln!(writer, "Workload:     {}", step_label(&self.workload_secret))?;
        writeln!(writer, "Restart:      {}", step_label(&self.restart))?;
        Ok(())
    }
}
