//! Audit command implementation.
//!
//! Lists recorded rotations, newest first.

use std::io::Write;

use drift_engine::{AuditEntry, AuditFilter, AuditStatus};
use serde::Serialize;

use crate::audit::JsonlAuditLog;
use crate::cli::AuditArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the audit command.
#[derive(Debug, Default)]
pub struct AuditCommand;

impl AuditCommand {
    /// Creates a new audit command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes the audit command.
    ///
    /// # Errors
    ///
    /// Returns error if the audit file cannot be read or output fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &AuditArgs,
    ) -> Result<(), CliError> {
        let log = JsonlAuditLog::new(&args.audit_log).load()?;

        let output = AuditOutput {
            entries: log.query(&Self::filter(args)),
        };
        format.write(out, &output)?;
        Ok(())
    }

    fn filter(args: &AuditArgs) -> AuditFilter {
        let mut filter = AuditFilter::new();
        if let Some(secret) = &args.secret {
            filter = filter.for_secret(secret.clone());
        }
        if let Some(account) = &args.account {
            filter = filter.for_account(account.clone());
        }
        if args.failed {
            filter = filter.with_status(AuditStatus::Failed);
        }
        if let Some(limit) = args.limit {
            filter = filter.limit(limit);
        }
        filter
    }
}

/// Audit entries as printed.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOutput {
    /// Matching entries, newest first.
    pub entries: Vec<AuditEntry>,
}

impl TableDisplay for AuditOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.entries.is_empty() {
            writeln!(writer, "No audit entries found")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<26}  {:<24}  {:<8}  {:<8}  {:<12}  MESSAGE",
            "TIMESTAMP", "SECRET", "ACTION", "STATUS", "ACCOUNT"
        )?;
        writeln!(writer, "{}", "─".repeat(110))?;

        for entry in &self.entries {
            writeln!(
                writer,
                "{:<26}  {:<24}  {:<8}  {:<8}  {:<12}  {}",
                entry.timestamp.to_rfc3339(),
                entry.secret_name,
                entry.action.to_string(),
                entry.status.to_string(),
                entry.account,
                entry.message
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} entry(ies)", self.entries.len())?;
        Ok(())
    }
}
