//! Scan command implementation.
//!
//! Correlates a namespace's secret usage with the vault inventory.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use drift_engine::{
    CorrelationRow, EngineConfig, ExpiryStatus, ScanReport, ScanSummary, ScanView, SecretEngine,
    VaultSecret, VaultValue,
};
use serde::Serialize;

use crate::cli::ScanArgs;
use crate::commands::load_state;
use crate::error::CliError;
use crate::output::{MASK, OutputFormat, TableDisplay, cell};

/// Handler for the scan command.
pub struct ScanCommand<'a> {
    state: &'a Path,
    config: &'a EngineConfig,
}

impl<'a> ScanCommand<'a> {
    /// Creates a new scan command handler.
    #[must_use]
    pub const fn new(state: &'a Path, config: &'a EngineConfig) -> Self {
        Self { state, config }
    }

    /// Executes the scan command.
    ///
    /// # Errors
    ///
    /// Returns error if the state file cannot be loaded or output fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &ScanArgs,
    ) -> Result<(), CliError> {
        let namespace = args
            .namespace
            .clone()
            .unwrap_or_else(|| self.config.namespace.clone());
        let (vault, cluster) = load_state(self.state)?.into_clients();
        let engine = SecretEngine::new(&vault, &cluster, self.config);

        let report = engine.scan_and_correlate(&namespace);
        let output = ScanOutput::from_report(namespace, report, args.view.into(), args.show_values);

        format.write(out, &output)?;
        Ok(())
    }
}

// Output types

/// Scan result as printed.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutput {
    /// Namespace that was scanned.
    pub namespace: String,
    /// Counts over the whole scan.
    pub summary: ScanSummary,
    /// Vault inventory, omitted by the workloads view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_secrets: Option<Vec<VaultRow>>,
    /// Usage rows, omitted by the vault view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workloads: Option<Vec<UsageRow>>,
}

/// One vault inventory line.
#[derive(Debug, Clone, Serialize)]
pub struct VaultRow {
    /// Secret name.
    pub name: String,
    /// Value, masked unless requested.
    pub value: String,
    /// Whether the secret is enabled.
    pub enabled: bool,
    /// Last update.
    pub updated_on: Option<DateTime<Utc>>,
    /// Expiry.
    pub expires_on: Option<DateTime<Utc>>,
    /// Expiry health.
    pub expiry_status: ExpiryStatus,
    /// Days until expiry.
    pub days_remaining: Option<i64>,
}

/// One workload usage line.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRow {
    /// Consuming pod.
    pub pod: String,
    /// Owning deployment.
    pub deployment: Option<String>,
    /// `Volume` or `EnvVar`.
    pub mechanism: String,
    /// Workload secret object.
    pub workload_secret: String,
    /// Correlation verdict.
    pub status: String,
    /// Matched vault secret.
    pub vault_secret: Option<String>,
    /// Matched vault value, masked unless requested.
    pub vault_value: Option<String>,
    /// Expiry health of the matched vault secret.
    pub expiry_status: Option<ExpiryStatus>,
    /// Days until the matched vault secret expires.
    pub days_remaining: Option<i64>,
}

impl ScanOutput {
    /// Builds the printable form of a report.
    #[must_use]
    pub fn from_report(
        namespace: String,
        report: ScanReport,
        view: ScanView,
        show_values: bool,
    ) -> Self {
        let summary = report.summary();
        let report = report.view(view);

        Self {
            namespace,
            summary,
            vault_secrets: (view != ScanView::Workloads).then(|| {
                report
                    .vault_secrets
                    .iter()
                    .map(|s| VaultRow::new(s, show_values))
                    .collect()
            }),
            workloads: (view != ScanView::Vault).then(|| {
                report
                    .rows
                    .iter()
                    .map(|r| UsageRow::new(r, show_values))
                    .collect()
            }),
        }
    }
}

fn render_value(value: &VaultValue, show_values: bool) -> String {
    match value {
        VaultValue::Plain(_) if !show_values => MASK.to_string(),
        other => other.as_display_str().to_string(),
    }
}

impl VaultRow {
    fn new(secret: &VaultSecret, show_values: bool) -> Self {
        Self {
            name: secret.name.clone(),
            value: render_value(&secret.value, show_values),
            enabled: secret.enabled,
            updated_on: secret.updated_on,
            expires_on: secret.expires_on,
            expiry_status: secret.expiry_status,
            days_remaining: secret.days_remaining,
        }
    }
}

impl UsageRow {
    fn new(row: &CorrelationRow, show_values: bool) -> Self {
        Self {
            pod: row.pod.clone(),
            deployment: row.deployment.clone(),
            mechanism: row.mechanism.to_string(),
            workload_secret: row.workload_secret.clone(),
            status: row.akv_status.to_string(),
            vault_secret: row.vault_name_ref.clone(),
            vault_value: row
                .vault_value
                .as_ref()
                .map(|v| render_value(v, show_values)),
            expiry_status: row.vault_expiry_status,
            days_remaining: row.days_remaining,
        }
    }
}

impl TableDisplay for ScanOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Namespace: {}", self.namespace)?;
        writeln!(writer, "══════════════════════════════════")?;

        if let Some(secrets) = &self.vault_secrets {
            writeln!(writer)?;
            writeln!(writer, "Vault secrets")?;
            if secrets.is_empty() {
                writeln!(writer, "No vault secrets found")?;
            } else {
                writeln!(
                    writer,
                    "{:<24}  {:<8}  {:<10}  {:>5}  {:<26}  {:<20}",
                    "NAME", "ENABLED", "STATUS", "DAYS", "EXPIRES", "VALUE"
                )?;
                writeln!(writer, "{}", "─".repeat(100))?;
                for s in secrets {
                    writeln!(
                        writer,
                        "{:<24}  {:<8}  {:<10}  {:>5}  {:<26}  {:<20}",
                        s.name,
                        if s.enabled { "yes" } else { "no" },
                        s.expiry_status.to_string(),
                        cell(s.days_remaining),
                        cell(s.expires_on.map(|t| t.to_rfc3339())),
                        s.value
                    )?;
                }
            }
        }

        if let Some(rows) = &self.workloads {
            writeln!(writer)?;
            writeln!(writer, "Workload usage")?;
            if rows.is_empty() {
                writeln!(writer, "No secret usage found")?;
            } else {
                writeln!(
                    writer,
                    "{:<24}  {:<16}  {:<8}  {:<20}  {:<32}  {:<10}",
                    "POD", "DEPLOYMENT", "VIA", "SECRET", "STATUS", "EXPIRY"
                )?;
                writeln!(writer, "{}", "─".repeat(118))?;
                for r in rows {
                    writeln!(
                        writer,
                        "{:<24}  {:<16}  {:<8}  {:<20}  {:<32}  {:<10}",
                        r.pod,
                        cell(r.deployment.as_deref()),
                        r.mechanism,
                        r.workload_secret,
                        r.status,
                        cell(r.expiry_status)
                    )?;
                }
            }
        }

        let s = &self.summary;
        writeln!(writer)?;
        writeln!(
            writer,
            "Total: {} vault secret(s), {} usage(s): {} synced, {} drift, {} unknown",
            s.vault_secrets, s.usages, s.synced, s.drift, s.unknown
        )?;
        if s.expiring > 0 || s.expired > 0 {
            writeln!(writer, "Expiring soon: {}  Expired: {}", s.expiring, s.expired)?;
        }
        Ok(())
    }
}
