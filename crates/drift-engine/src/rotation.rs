//! Secret rotation across the vault and the workload cluster.
//!
//! Rotation is forward-only: generate a value, write it to the vault,
//! patch the workload secret, restart the deployment. Nothing is rolled
//! back when a later step fails. Only the vault write is fatal; a failed
//! workload patch or restart leaves the rotation successful but
//! [`RotationStatus::Degraded`].

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::client::{ClusterClient, SecretData, VaultClient};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::inventory::InventoryReader;
use crate::scanner::encode_value;
use crate::types::RotationOutcome;

/// What to rotate and where.
#[derive(Clone, PartialEq, Eq)]
pub struct RotationRequest {
    /// Vault secret receiving the new version.
    pub vault_secret: String,
    /// Workload secret object to patch, if mapped.
    pub workload_secret: Option<String>,
    /// Deployment to restart, if known.
    pub deployment: Option<String>,
    /// Namespace of the workload secret and deployment.
    pub namespace: String,
    /// Value to use instead of a generated one; blank means generate.
    pub new_value: Option<String>,
    /// Expiry for the new vault version.
    pub expires_on: Option<DateTime<Utc>>,
}

impl RotationRequest {
    /// Creates a vault-only rotation request in the given namespace.
    #[must_use]
    pub fn new(vault_secret: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            vault_secret: vault_secret.into(),
            workload_secret: None,
            deployment: None,
            namespace: namespace.into(),
            new_value: None,
            expires_on: None,
        }
    }

    /// Also patches the named workload secret.
    #[must_use]
    pub fn with_workload_secret(mut self, name: impl Into<String>) -> Self {
        self.workload_secret = Some(name.into());
        self
    }

    /// Also restarts the named deployment.
    #[must_use]
    pub fn with_deployment(mut self, name: impl Into<String>) -> Self {
        self.deployment = Some(name.into());
        self
    }

    /// Uses a caller-supplied value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    /// Sets an expiry on the new vault version.
    #[must_use]
    pub fn with_expiry(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }
}

impl std::fmt::Debug for RotationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationRequest")
            .field("vault_secret", &self.vault_secret)
            .field("workload_secret", &self.workload_secret)
            .field("deployment", &self.deployment)
            .field("namespace", &self.namespace)
            .field("new_value", &self.new_value.as_ref().map(|_| "[REDACTED]"))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Result of a single rotation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason")]
pub enum StepStatus {
    /// The step ran and succeeded.
    Applied,
    /// The step was not requested, or the workflow stopped before it.
    Skipped,
    /// The step ran and failed.
    Failed(String),
}

impl StepStatus {
    /// Returns true if the step failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Overall classification of a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RotationStatus {
    /// Every requested step succeeded.
    Completed,
    /// The vault was updated but a workload step failed.
    Degraded,
    /// The vault update failed; nothing else ran.
    Failed,
}

/// Typed result of a rotation.
///
/// `outcome` is the flattened form stored by the audit trail; the step
/// fields keep what the flattening loses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    /// Success flag and message.
    pub outcome: RotationOutcome,
    /// Vault write.
    pub vault: StepStatus,
    /// Workload secret patch.
    pub workload_secret: StepStatus,
    /// Deployment restart.
    pub restart: StepStatus,
}

impl RotationReport {
    /// Derives the overall status from the step results.
    #[must_use]
    pub const fn status(&self) -> RotationStatus {
        if !self.outcome.success {
            RotationStatus::Failed
        } else if self.workload_secret.is_failed() || self.restart.is_failed() {
            RotationStatus::Degraded
        } else {
            RotationStatus::Completed
        }
    }
}

/// Generates random secret values from the OS CSPRNG.
#[derive(Debug, Clone)]
pub struct SecretGenerator {
    length: usize,
    alphabet: Vec<char>,
}

impl SecretGenerator {
    /// Creates a generator drawing from ASCII letters, digits and `punctuation`.
    #[must_use]
    pub fn new(length: usize, punctuation: &str) -> Self {
        let mut alphabet: Vec<char> = ('a'..='z').chain('A'..='Z').chain('0'..='9').collect();
        for c in punctuation.chars() {
            if !alphabet.contains(&c) {
                alphabet.push(c);
            }
        }
        Self { length, alphabet }
    }

    /// Creates a generator from engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.generated_length, &config.punctuation)
    }

    /// Returns the characters values are drawn from.
    #[must_use]
    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    /// Generates a fresh value, zeroized when dropped.
    #[must_use]
    pub fn generate(&self) -> Zeroizing<String> {
        let mut rng = OsRng;
        let value: String = (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect();
        Zeroizing::new(value)
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Picks the workload secret field a rotation should overwrite.
///
/// Each hint is tried in turn against every field name, case-insensitively,
/// then the vault secret name, then the first field.
#[must_use]
pub fn select_target_key<'d>(
    data: &'d SecretData,
    vault_secret: &str,
    key_hints: &[String],
) -> Option<&'d str> {
    let fields: Vec<(&'d str, String)> = data
        .keys()
        .map(|key| (key.as_str(), key.to_lowercase()))
        .collect();

    key_hints
        .iter()
        .map(|hint| hint.to_lowercase())
        .chain(std::iter::once(vault_secret.to_lowercase()))
        .find_map(|needle| {
            fields
                .iter()
                .find(|(_, lowered)| lowered.contains(&needle))
                .map(|(key, _)| *key)
        })
        .or_else(|| fields.first().map(|(key, _)| *key))
}

/// Parses an expiry given as `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// A plain date means the last second of that day, UTC.
pub fn parse_expiry_date(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(23, 59, 59)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| Error::InvalidExpiry {
                input: input.to_string(),
                reason: "date out of range".to_string(),
            });
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| Error::InvalidExpiry {
            input: input.to_string(),
            reason: err.to_string(),
        })
}

/// Runs rotations against a vault and a cluster.
pub struct RotationWorkflow<'a, V: VaultClient + ?Sized, C: ClusterClient + ?Sized> {
    vault: &'a V,
    cluster: &'a C,
    generator: SecretGenerator,
    key_hints: Vec<String>,
}

impl<'a, V: VaultClient + ?Sized, C: ClusterClient + ?Sized> RotationWorkflow<'a, V, C> {
    /// Creates a workflow over the given handles.
    #[must_use]
    pub fn new(vault: &'a V, cluster: &'a C, config: &EngineConfig) -> Self {
        Self {
            vault,
            cluster,
            generator: SecretGenerator::from_config(config),
            key_hints: config.key_hints.clone(),
        }
    }

    /// Runs a rotation, stamping any restart with `now`.
    pub fn run(&self, request: &RotationRequest, now: DateTime<Utc>) -> RotationReport {
        let name = request.vault_secret.as_str();
        info!(secret = %name, "starting rotation");

        // A blank caller value means "generate one".
        let value = match request.new_value.as_deref().filter(|v| !v.is_empty()) {
            Some(value) => {
                info!(secret = %name, "using caller-supplied value");
                Zeroizing::new(value.to_string())
            }
            None => {
                info!(secret = %name, "generated random value");
                self.generator.generate()
            }
        };

        if let Err(err) =
            InventoryReader::new(self.vault).set_secret(name, value.as_str(), request.expires_on)
        {
            warn!(secret = %name, error = %err, "vault update failed; aborting rotation");
            return RotationReport {
                outcome: RotationOutcome::failure(format!("Failed to update vault: {err}")),
                vault: StepStatus::Failed(err.to_string()),
                workload_secret: StepStatus::Skipped,
                restart: StepStatus::Skipped,
            };
        }
        info!(secret = %name, expires_on = ?request.expires_on, "vault secret updated");

        let workload_secret = match &request.workload_secret {
            Some(workload) => self.update_workload_secret(request, workload, value.as_str()),
            None => StepStatus::Skipped,
        };

        let (restart, message) = match &request.deployment {
            Some(deployment) => self.restart_deployment(request, deployment, now),
            None => (StepStatus::Skipped, format!("Successfully rotated {name}.")),
        };

        RotationReport {
            outcome: RotationOutcome::success(message),
            vault: StepStatus::Applied,
            workload_secret,
            restart,
        }
    }

    /// Restarts the deployment and builds the outcome message to match.
    fn restart_deployment(
        &self,
        request: &RotationRequest,
        deployment: &str,
        now: DateTime<Utc>,
    ) -> (StepStatus, String) {
        let name = request.vault_secret.as_str();
        match self
            .cluster
            .patch_deployment_restart(deployment, &request.namespace, now)
        {
            Ok(()) => {
                info!(deployment = %deployment, "deployment restarted");
                let message =
                    format!("Successfully rotated {name} and restarted deployment {deployment}.");
                (StepStatus::Applied, message)
            }
            Err(err) => {
                warn!(deployment = %deployment, error = %err, "deployment restart failed");
                let message = format!(
                    "Secret {name} rotated but deployment {deployment} restart failed: {err}"
                );
                (StepStatus::Failed(err.to_string()), message)
            }
        }
    }

    /// Best-effort patch of the workload secret. Failures are logged only.
    fn update_workload_secret(
        &self,
        request: &RotationRequest,
        workload: &str,
        value: &str,
    ) -> StepStatus {
        let namespace = request.namespace.as_str();
        let data = match self.cluster.read_secret(workload, namespace) {
            Ok(data) => data,
            Err(err) => {
                warn!(workload_secret = %workload, error = %err, "workload secret read failed");
                return StepStatus::Failed(err.to_string());
            }
        };

        let Some(key) = select_target_key(&data, &request.vault_secret, &self.key_hints) else {
            warn!(workload_secret = %workload, "workload secret has no fields; nothing to patch");
            return StepStatus::Skipped;
        };

        let patch = SecretData::from([(key.to_string(), encode_value(value))]);
        match self.cluster.patch_secret(workload, namespace, patch) {
            Ok(()) => {
                info!(workload_secret = %workload, key = %key, "workload secret updated");
                StepStatus::Applied
            }
            Err(err) => {
                warn!(
                    workload_secret = %workload,
                    key = %key,
                    error = %err,
                    "workload secret patch failed"
                );
                StepStatus::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ClusterFaults, MemoryCluster, MemoryVault, VaultFaults};
    use chrono::{TimeZone, Timelike};
    use proptest::prelude::*;
    use test_case::test_case;

    const NS: &str = "default";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    fn fixture() -> (MemoryVault, MemoryCluster) {
        let vault = MemoryVault::new();
        vault.insert("db-password", "old-value", None);

        let cluster = MemoryCluster::new();
        cluster.insert_secret(NS, "db-creds", &[("password", "old-value"), ("user", "app")]);
        cluster.insert_deployment(NS, "api");
        (vault, cluster)
    }

    fn hints() -> Vec<String> {
        vec!["password".to_string(), "secret".to_string()]
    }

    #[test]
    fn full_rotation_updates_everything() {
        let (vault, cluster) = fixture();
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS)
            .with_workload_secret("db-creds")
            .with_deployment("api")
            .with_value("n3w-value");

        let report = workflow.run(&request, now());

        assert!(report.outcome.success);
        assert_eq!(report.status(), RotationStatus::Completed);
        assert_eq!(
            report.outcome.message,
            "Successfully rotated db-password and restarted deployment api."
        );
        assert_eq!(vault.value("db-password").as_deref(), Some("n3w-value"));
        assert_eq!(cluster.secret_field(NS, "db-creds", "password").as_deref(), Some("n3w-value"));
        assert_eq!(cluster.secret_field(NS, "db-creds", "user").as_deref(), Some("app"));
        assert_eq!(cluster.restarted_at(NS, "api"), Some(now().to_rfc3339()));
    }

    #[test]
    fn generated_value_is_written_to_both_systems() {
        let (vault, cluster) = fixture();
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS).with_workload_secret("db-creds");

        let report = workflow.run(&request, now());

        assert!(report.outcome.success);
        let stored = vault.value("db-password").expect("value present");
        assert_eq!(stored.chars().count(), 32);
        assert_ne!(stored, "old-value");
        assert_eq!(cluster.secret_field(NS, "db-creds", "password"), Some(stored.clone()));
        assert!(!report.outcome.message.contains(&stored));
    }

    #[test]
    fn empty_caller_value_is_replaced_by_generated_one() {
        let (vault, cluster) = fixture();
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS)
            .with_workload_secret("db-creds")
            .with_value("");

        let report = workflow.run(&request, now());

        assert!(report.outcome.success);
        let stored = vault.value("db-password").expect("value present");
        assert_eq!(stored.chars().count(), 32);
        assert_eq!(cluster.secret_field(NS, "db-creds", "password"), Some(stored));
    }

    #[test]
    fn expiry_is_passed_to_vault() {
        let (vault, cluster) = fixture();
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let expiry = now() + chrono::TimeDelta::days(90);

        workflow.run(&RotationRequest::new("db-password", NS).with_expiry(expiry), now());

        assert_eq!(vault.expires_on("db-password"), Some(expiry));
    }

    #[test]
    fn vault_failure_aborts_without_touching_cluster() {
        let (vault, cluster) = fixture();
        vault.set_faults(VaultFaults::default().reject_writes());
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS)
            .with_workload_secret("db-creds")
            .with_deployment("api")
            .with_value("must-not-leak");

        let report = workflow.run(&request, now());

        assert!(!report.outcome.success);
        assert_eq!(report.status(), RotationStatus::Failed);
        assert!(report.outcome.message.starts_with("Failed to update vault: "));
        assert!(!report.outcome.message.contains("must-not-leak"));
        assert_eq!(report.workload_secret, StepStatus::Skipped);
        assert_eq!(report.restart, StepStatus::Skipped);
        assert_eq!(cluster.secret_field(NS, "db-creds", "password").as_deref(), Some("old-value"));
        assert_eq!(cluster.restarted_at(NS, "api"), None);
        assert_eq!(cluster.secret_patches(), 0);
    }

    #[test]
    fn workload_patch_failure_is_absorbed() {
        let (vault, cluster) = fixture();
        cluster.set_faults(ClusterFaults::default().fail_secret_patch("db-creds"));
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS)
            .with_workload_secret("db-creds")
            .with_value("n3w");

        let report = workflow.run(&request, now());

        assert!(report.outcome.success);
        assert_eq!(report.outcome.message, "Successfully rotated db-password.");
        assert!(!report.outcome.message.contains("restart"));
        assert!(report.workload_secret.is_failed());
        assert_eq!(report.status(), RotationStatus::Degraded);
        assert_eq!(vault.value("db-password").as_deref(), Some("n3w"));
    }

    #[test]
    fn workload_read_failure_still_restarts() {
        let (vault, cluster) = fixture();
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS)
            .with_workload_secret("no-such-secret")
            .with_deployment("api");

        let report = workflow.run(&request, now());

        assert!(report.outcome.success);
        assert!(report.workload_secret.is_failed());
        assert_eq!(report.restart, StepStatus::Applied);
        assert!(cluster.restarted_at(NS, "api").is_some());
    }

    #[test]
    fn restart_failure_is_reported_in_message() {
        let (vault, cluster) = fixture();
        cluster.set_faults(ClusterFaults::default().fail_restart("api"));
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());
        let request = RotationRequest::new("db-password", NS)
            .with_workload_secret("db-creds")
            .with_deployment("api");

        let report = workflow.run(&request, now());

        assert!(report.outcome.success);
        assert_eq!(report.status(), RotationStatus::Degraded);
        assert!(report.outcome.message.contains("rotated"));
        assert!(report.outcome.message.contains("restart failed"));
        assert!(report.restart.is_failed());
        assert_eq!(report.workload_secret, StepStatus::Applied);
    }

    #[test]
    fn empty_workload_secret_is_skipped() {
        let (vault, cluster) = fixture();
        cluster.insert_secret(NS, "empty", &[]);
        let workflow = RotationWorkflow::new(&vault, &cluster, &EngineConfig::default());

        let request = RotationRequest::new("db-password", NS).with_workload_secret("empty");
        let report = workflow.run(&request, now());

        assert_eq!(report.workload_secret, StepStatus::Skipped);
        assert_eq!(report.status(), RotationStatus::Completed);
    }

    fn data(keys: &[&str]) -> SecretData {
        keys.iter().map(|k| ((*k).to_string(), String::new())).collect()
    }

    #[test_case(&["user", "DB_PASSWORD"], "db", "DB_PASSWORD" ; "password hint")]
    #[test_case(&["client_secret", "db_password"], "db", "db_password" ; "password beats secret")]
    #[test_case(&["token", "client_secret"], "db", "client_secret" ; "secret hint")]
    #[test_case(&["host", "stripe-key"], "Stripe-Key", "stripe-key" ; "vault name")]
    #[test_case(&["host", "port"], "db", "host" ; "first field fallback")]
    fn target_key_selection(keys: &[&str], vault_name: &str, expected: &str) {
        let data = data(keys);
        assert_eq!(select_target_key(&data, vault_name, &hints()), Some(expected));
    }

    #[test]
    fn target_key_none_for_empty_secret() {
        assert_eq!(select_target_key(&SecretData::new(), "db", &hints()), None);
    }

    #[test]
    fn parse_plain_date_is_end_of_day() {
        let parsed = parse_expiry_date("2026-12-31").expect("valid date");
        assert_eq!(parsed.date_naive().to_string(), "2026-12-31");
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (23, 59, 59));
    }

    #[test]
    fn parse_rfc3339_timestamp() {
        let parsed = parse_expiry_date("2026-06-01T10:00:00+02:00").expect("valid timestamp");
        assert_eq!(parsed.to_rfc3339(), "2026-06-01T08:00:00+00:00");
    }

    #[test]
    fn parse_garbage_is_rejected() {
        assert!(matches!(parse_expiry_date("next tuesday"), Err(Error::InvalidExpiry { .. })));
    }

    #[test]
    fn request_debug_redacts_value() {
        let request = RotationRequest::new("db", NS).with_value("hunter2");
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    proptest! {
        #[test]
        fn generated_values_use_alphabet(length in 1usize..64) {
            let generator = SecretGenerator::new(length, "!@#$%");
            let value = generator.generate();
            prop_assert_eq!(value.chars().count(), length);
            prop_assert!(value.chars().all(|c| generator.alphabet().contains(&c)));
        }
    }

    #[test]
    fn default_alphabet_has_letters_digits_and_punctuation() {
        let generator = SecretGenerator::default();
        assert_eq!(generator.alphabet().len(), 26 + 26 + 10 + 5);
        assert!(generator.alphabet().contains(&'%'));
    }
}
