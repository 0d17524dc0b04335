//! Audit records for rotations.
//!
//! The engine builds [`AuditEntry`] values from rotation outcomes; an
//! [`AuditSink`] persists them. [`AuditLog`] is an in-memory sink that can
//! be queried, newest first.

use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::RotationOutcome;

/// Actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// A secret was rotated.
    Rotated,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotated => write!(f, "Rotated"),
        }
    }
}

/// Whether the audited action succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    /// The action succeeded, possibly degraded.
    Success,
    /// The action failed.
    Failed,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// An entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the action completed.
    pub timestamp: DateTime<Utc>,
    /// Vault secret the action applied to.
    pub secret_name: String,
    /// What was done.
    pub action: AuditAction,
    /// Whether it worked.
    pub status: AuditStatus,
    /// Outcome message, including degraded-success detail.
    pub message: String,
    /// Account that owns the vault connection.
    pub account: String,
}

impl AuditEntry {
    /// Builds the entry for a rotation outcome.
    #[must_use]
    pub fn for_rotation(
        secret_name: impl Into<String>,
        outcome: &RotationOutcome,
        account: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            secret_name: secret_name.into(),
            action: AuditAction::Rotated,
            status: if outcome.success {
                AuditStatus::Success
            } else {
                AuditStatus::Failed
            },
            message: outcome.message.clone(),
            account: account.into(),
        }
    }
}

/// Persists audit entries.
pub trait AuditSink {
    /// Stores one entry.
    fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Filter criteria for querying an [`AuditLog`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Only entries for this secret.
    pub secret_name: Option<String>,
    /// Only entries for this account.
    pub account: Option<String>,
    /// Only entries with this status.
    pub status: Option<AuditStatus>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl AuditFilter {
    /// Creates a filter that matches every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by secret name.
    #[must_use]
    pub fn for_secret(mut self, secret_name: impl Into<String>) -> Self {
        self.secret_name = Some(secret_name.into());
        self
    }

    /// Filters by account.
    #[must_use]
    pub fn for_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Filters by status.
    #[must_use]
    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Limits the number of returned entries.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        self.secret_name.as_ref().is_none_or(|name| &entry.secret_name == name)
            && self.account.as_ref().is_none_or(|account| &entry.account == account)
            && self.status.is_none_or(|status| entry.status == status)
    }
}

/// An in-memory audit trail.
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Returns matching entries, newest first.
    #[must_use]
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Reverse first so entries sharing a timestamp also come out newest first.
        let mut results: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        results
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for AuditLog {
    fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("entries_count", &self.len())
            .finish()
    }
}
