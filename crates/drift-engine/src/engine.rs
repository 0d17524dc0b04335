//! The engine facade: scan-and-correlate and rotate over injected clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};

use crate::audit::{AuditEntry, AuditSink};
use crate::client::{ClusterClient, VaultClient};
use crate::config::EngineConfig;
use crate::correlate::correlate;
use crate::error::Result;
use crate::inventory::InventoryReader;
use crate::rotation::{RotationReport, RotationRequest, RotationWorkflow};
use crate::scanner::UsageScanner;
use crate::types::{AkvStatus, CorrelationRow, ExpiryStatus, VaultSecret};

/// Which half of a scan to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanView {
    /// Inventory and correlation rows.
    #[default]
    All,
    /// Vault inventory only.
    Vault,
    /// Correlation rows only.
    Workloads,
}

/// Counts over a scan, for at-a-glance reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Secrets in the vault inventory.
    pub vault_secrets: usize,
    /// Usage rows.
    pub usages: usize,
    /// Rows matched by value.
    pub synced: usize,
    /// Rows matched by name only.
    pub drift: usize,
    /// Rows with no vault match.
    pub unknown: usize,
    /// Vault secrets in Warning or Critical state.
    pub expiring: usize,
    /// Vault secrets already expired.
    pub expired: usize,
}

/// Result of [`SecretEngine::scan_and_correlate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Vault inventory, in listing order.
    pub vault_secrets: Vec<VaultSecret>,
    /// One row per observed usage, in scan order.
    pub rows: Vec<CorrelationRow>,
}

impl ScanReport {
    /// Keeps only the parts named by `view`.
    #[must_use]
    pub fn view(mut self, view: ScanView) -> Self {
        match view {
            ScanView::All => {}
            ScanView::Vault => self.rows.clear(),
            ScanView::Workloads => self.vault_secrets.clear(),
        }
        self
    }

    /// Counts rows and inventory health.
    #[must_use]
    pub fn summary(&self) -> ScanSummary {
        let mut summary = ScanSummary {
            vault_secrets: self.vault_secrets.len(),
            usages: self.rows.len(),
            ..ScanSummary::default()
        };

        for row in &self.rows {
            match row.akv_status {
                AkvStatus::Synced(_) => summary.synced += 1,
                AkvStatus::Drift(_) => summary.drift += 1,
                AkvStatus::Unknown => summary.unknown += 1,
            }
        }

        for secret in &self.vault_secrets {
            match secret.expiry_status {
                ExpiryStatus::Warning | ExpiryStatus::Critical => summary.expiring += 1,
                ExpiryStatus::Expired => summary.expired += 1,
                ExpiryStatus::Healthy => {}
            }
        }
        summary
    }
}

/// Scans and rotates using client handles supplied by the caller.
///
/// The engine holds no connection state of its own; build one per request.
pub struct SecretEngine<'a, V: VaultClient + ?Sized, C: ClusterClient + ?Sized> {
    vault: &'a V,
    cluster: &'a C,
    config: &'a EngineConfig,
}

impl<'a, V: VaultClient + ?Sized, C: ClusterClient + ?Sized> SecretEngine<'a, V, C> {
    /// Creates an engine over the given handles.
    #[must_use]
    pub const fn new(vault: &'a V, cluster: &'a C, config: &'a EngineConfig) -> Self {
        Self {
            vault,
            cluster,
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Reads the vault, scans the namespace and correlates the two.
    #[must_use]
    pub fn scan_and_correlate(&self, namespace: &str) -> ScanReport {
        self.scan_and_correlate_at(namespace, Utc::now())
    }

    /// Like [`Self::scan_and_correlate`], classifying expiry against `now`.
    #[must_use]
    pub fn scan_and_correlate_at(&self, namespace: &str, now: DateTime<Utc>) -> ScanReport {
        let _span = info_span!("scan", namespace = %namespace).entered();

        let vault_secrets = InventoryReader::new(self.vault).list(now);
        let usage = UsageScanner::new(self.cluster).scan(namespace);
        let rows = correlate(&usage, &vault_secrets);

        let report = ScanReport {
            vault_secrets,
            rows,
        };
        let summary = report.summary();
        info!(
            vault_secrets = summary.vault_secrets,
            usages = summary.usages,
            synced = summary.synced,
            drift = summary.drift,
            unknown = summary.unknown,
            "scan correlated"
        );
        report
    }

    /// Rotates a secret, stamping any restart with the current time.
    #[must_use]
    pub fn rotate(&self, request: &RotationRequest) -> RotationReport {
        self.rotate_at(request, Utc::now())
    }

    /// Rotates a secret, stamping any restart with `now`.
    #[must_use]
    pub fn rotate_at(&self, request: &RotationRequest, now: DateTime<Utc>) -> RotationReport {
        let _span = info_span!("rotate", secret = %request.vault_secret).entered();
        RotationWorkflow::new(self.vault, self.cluster, self.config).run(request, now)
    }

    /// Rotates a secret and records the outcome for `account`.
    ///
    /// The rotation has already happened when the sink is called, so a sink
    /// error does not undo it.
    pub fn rotate_and_audit(
        &self,
        request: &RotationRequest,
        account: &str,
        sink: &dyn AuditSink,
    ) -> Result<RotationReport> {
        let now = Utc::now();
        let report = self.rotate_at(request, now);
        sink.record(AuditEntry::for_rotation(
            request.vault_secret.clone(),
            &report.outcome,
            account,
            now,
        ))?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, AuditLog, AuditStatus};
    use crate::client::{Container, Pod, REPLICA_SET_KIND};
    use crate::memory::{MemoryCluster, MemoryVault, VaultFaults};
    use crate::rotation::RotationStatus;
    use chrono::{TimeDelta, TimeZone};

    const NS: &str = "default";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    fn fixture() -> (MemoryVault, MemoryCluster) {
        let vault = MemoryVault::new();
        vault.insert("db-password", "s3cret", Some(now() + TimeDelta::days(1)));
        vault.insert("api-token", "fresh-token", None);
        vault.insert("orphan", "unused", Some(now() - TimeDelta::days(3)));

        let cluster = MemoryCluster::new();
        cluster.insert_secret(NS, "db-creds", &[("password", "s3cret")]);
        cluster.insert_secret(NS, "api-secrets", &[("token", "stale-token")]);
        cluster.insert_replica_set(NS, "api-6c9", Some("api"));
        cluster.insert_deployment(NS, "api");
        cluster.insert_pod(
            NS,
            Pod::new("api-6c9-a")
                .with_owner(REPLICA_SET_KIND, "api-6c9")
                .with_secret_volume("tls", "api-tls")
                .with_container(
                    Container::new("app")
                        .with_secret_ref("DB_PASSWORD", "db-creds", "password")
                        .with_secret_ref("API_TOKEN", "api-secrets", "token"),
                ),
        );
        (vault, cluster)
    }

    #[test]
    fn scan_and_correlate_classifies_each_usage() {
        let (vault, cluster) = fixture();
        let config = EngineConfig::default();
        let engine = SecretEngine::new(&vault, &cluster, &config);

        let report = engine.scan_and_correlate_at(NS, now());

        assert_eq!(report.vault_secrets.len(), 3);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].akv_status, AkvStatus::Unknown);
        assert_eq!(report.rows[1].akv_status, AkvStatus::Synced("db-password".into()));
        assert_eq!(report.rows[1].vault_expiry_status, Some(ExpiryStatus::Critical));
        assert_eq!(report.rows[1].days_remaining, Some(1));
        assert_eq!(report.rows[2].akv_status, AkvStatus::Drift("api-token".into()));
        assert!(report.rows.iter().all(|r| r.deployment.as_deref() == Some("api")));

        let summary = report.summary();
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.drift, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.expiring, 1);
        assert_eq!(summary.expired, 1);
    }

    #[test]
    fn vault_outage_leaves_rows_unknown() {
        let (vault, cluster) = fixture();
        vault.set_faults(VaultFaults::default().unreachable());
        let config = EngineConfig::default();
        let engine = SecretEngine::new(&vault, &cluster, &config);

        let report = engine.scan_and_correlate_at(NS, now());

        assert!(report.vault_secrets.is_empty());
        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().all(|r| r.akv_status == AkvStatus::Unknown));
    }

    #[test]
    fn views_keep_requested_half() {
        let (vault, cluster) = fixture();
        let config = EngineConfig::default();
        let engine = SecretEngine::new(&vault, &cluster, &config);
        let report = engine.scan_and_correlate_at(NS, now());

        let vault_only = report.clone().view(ScanView::Vault);
        assert!(vault_only.rows.is_empty());
        assert_eq!(vault_only.vault_secrets.len(), 3);

        let workloads = report.clone().view(ScanView::Workloads);
        assert!(workloads.vault_secrets.is_empty());
        assert_eq!(workloads.rows.len(), 3);

        assert_eq!(report.clone().view(ScanView::All), report);
    }

    #[test]
    fn rotation_brings_drifted_usage_back_in_sync() {
        let (vault, cluster) = fixture();
        let config = EngineConfig::default();
        let engine = SecretEngine::new(&vault, &cluster, &config);

        let request = RotationRequest::new("api-token", NS)
            .with_workload_secret("api-secrets")
            .with_deployment("api");
        let report = engine.rotate_at(&request, now());
        assert_eq!(report.status(), RotationStatus::Completed);

        let scan = engine.scan_and_correlate_at(NS, now());
        assert_eq!(scan.rows[2].akv_status, AkvStatus::Synced("api-token".into()));
    }

    #[test]
    fn rotate_and_audit_records_outcome() {
        let (vault, cluster) = fixture();
        let config = EngineConfig::default();
        let engine = SecretEngine::new(&vault, &cluster, &config);
        let log = AuditLog::new();

        engine
            .rotate_and_audit(&RotationRequest::new("db-password", NS), "acct-7", &log)
            .expect("audit should record");
        vault.set_faults(VaultFaults::default().reject_writes());
        let failed = engine
            .rotate_and_audit(&RotationRequest::new("db-password", NS), "acct-7", &log)
            .expect("audit should record");

        assert!(!failed.outcome.success);
        let entries = log.query(&AuditFilter::new().for_account("acct-7"));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.status == AuditStatus::Failed));
        assert!(entries.iter().any(|e| e.status == AuditStatus::Success));
        assert!(entries.iter().all(|e| e.secret_name == "db-password"));
    }
}
