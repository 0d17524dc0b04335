//! In-memory vault and cluster backed by serializable snapshots.
//!
//! Both implementations support fault injection so every degraded path of
//! the scanner and the rotation workflow can be exercised without a real
//! backend. The CLI uses them to run against a JSON state file.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    ClientResult, ClusterClient, OwnerReference, Pod, RESTART_ANNOTATION, SecretData,
    SecretProperties, VaultClient,
};
use crate::error::{ClientError, Result};
use crate::scanner::{decode_value, encode_value};

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A vault secret as held by [`MemoryVault`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    /// Secret name.
    pub name: String,
    /// Current value.
    pub value: String,
    /// Whether the secret is enabled. Disabled values cannot be read.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// When the current version was written.
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
    /// Expiry of the current version.
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
    /// Version counter, starting at 1.
    #[serde(default = "first_version")]
    pub version: u64,
}

const fn enabled_by_default() -> bool {
    true
}

const fn first_version() -> u64 {
    1
}

/// Serializable vault contents, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultSnapshot {
    /// Stored secrets.
    pub secrets: Vec<StoredSecret>,
}

/// Failures a [`MemoryVault`] should simulate.
#[derive(Debug, Clone, Default)]
pub struct VaultFaults {
    unreachable: bool,
    denied_values: HashSet<String>,
    reject_writes: bool,
}

impl VaultFaults {
    /// Every call fails as if the vault were down.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Reading this secret's value is denied.
    #[must_use]
    pub fn deny_value(mut self, name: impl Into<String>) -> Self {
        self.denied_values.insert(name.into());
        self
    }

    /// Every write is refused.
    #[must_use]
    pub fn reject_writes(mut self) -> Self {
        self.reject_writes = true;
        self
    }
}

/// A [`VaultClient`] over an in-memory secret list.
#[derive(Debug, Default)]
pub struct MemoryVault {
    secrets: RwLock<Vec<StoredSecret>>,
    faults: RwLock<VaultFaults>,
}

impl MemoryVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vault holding the snapshot's secrets.
    #[must_use]
    pub fn from_snapshot(snapshot: VaultSnapshot) -> Self {
        Self {
            secrets: RwLock::new(snapshot.secrets),
            faults: RwLock::default(),
        }
    }

    /// Captures the current contents.
    #[must_use]
    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            secrets: read(&self.secrets).clone(),
        }
    }

    /// Adds or replaces a secret at version 1.
    pub fn insert(&self, name: &str, value: &str, expires_on: Option<DateTime<Utc>>) {
        let stored = StoredSecret {
            name: name.to_string(),
            value: value.to_string(),
            enabled: true,
            updated_on: Some(Utc::now()),
            expires_on,
            version: 1,
        };
        let mut secrets = write(&self.secrets);
        match secrets.iter_mut().find(|s| s.name == name) {
            Some(existing) => *existing = stored,
            None => secrets.push(stored),
        }
    }

    /// Replaces the simulated faults.
    pub fn set_faults(&self, faults: VaultFaults) {
        *write(&self.faults) = faults;
    }

    /// Returns a secret's current value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.find(name, |s| s.value.clone())
    }

    /// Returns a secret's current version.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.find(name, |s| s.version)
    }

    /// Returns a secret's current expiry.
    #[must_use]
    pub fn expires_on(&self, name: &str) -> Option<DateTime<Utc>> {
        self.find(name, |s| s.expires_on).flatten()
    }

    /// Returns the number of secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.secrets).len()
    }

    /// Returns true if the vault holds no secrets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find<T>(&self, name: &str, f: impl FnOnce(&StoredSecret) -> T) -> Option<T> {
        read(&self.secrets).iter().find(|s| s.name == name).map(f)
    }

    fn check_reachable(&self) -> ClientResult<()> {
        if read(&self.faults).unreachable {
            return Err(ClientError::Unreachable("vault is not reachable".to_string()));
        }
        Ok(())
    }
}

impl VaultClient for MemoryVault {
    fn list_secret_metadata(&self) -> ClientResult<Vec<SecretProperties>> {
        self.check_reachable()?;
        Ok(read(&self.secrets)
            .iter()
            .map(|s| SecretProperties {
                name: s.name.clone(),
                enabled: s.enabled,
                updated_on: s.updated_on,
                expires_on: s.expires_on,
            })
            .collect())
    }

    fn get_secret_value(&self, name: &str) -> ClientResult<String> {
        self.check_reachable()?;
        if read(&self.faults).denied_values.contains(name) {
            return Err(ClientError::AccessDenied(format!("get on secret {name}")));
        }

        let secrets = read(&self.secrets);
        let stored = secrets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ClientError::not_found("secret", name))?;
        if !stored.enabled {
            return Err(ClientError::AccessDenied(format!("secret {name} is disabled")));
        }
        Ok(stored.value.clone())
    }

    fn set_secret(
        &self,
        name: &str,
        value: &str,
        expires_on: Option<DateTime<Utc>>,
    ) -> ClientResult<()> {
        self.check_reachable()?;
        if read(&self.faults).reject_writes {
            return Err(ClientError::Rejected(format!("write to secret {name} refused")));
        }

        let now = Utc::now();
        let mut secrets = write(&self.secrets);
        if let Some(stored) = secrets.iter_mut().find(|s| s.name == name) {
            stored.value = value.to_string();
            stored.expires_on = expires_on;
            stored.updated_on = Some(now);
            stored.version += 1;
            debug!(secret = %name, version = stored.version, "vault secret version written");
        } else {
            secrets.push(StoredSecret {
                name: name.to_string(),
                value: value.to_string(),
                enabled: true,
                updated_on: Some(now),
                expires_on,
                version: 1,
            });
            debug!(secret = %name, "vault secret created");
        }
        Ok(())
    }
}

/// A deployment as held by [`MemoryCluster`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
    /// Pod template annotations.
    #[serde(default)]
    pub template_annotations: BTreeMap<String, String>,
}

/// Objects in one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceSnapshot {
    /// Pods, in listing order.
    pub pods: Vec<Pod>,
    /// Replica sets and their owners.
    pub replica_sets: BTreeMap<String, Vec<OwnerReference>>,
    /// Secret objects, values base64-encoded.
    pub secrets: BTreeMap<String, SecretData>,
    /// Deployments.
    pub deployments: BTreeMap<String, DeploymentSnapshot>,
}

/// Serializable cluster contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSnapshot {
    /// Namespaces by name.
    pub namespaces: BTreeMap<String, NamespaceSnapshot>,
}

/// Failures a [`MemoryCluster`] should simulate.
#[derive(Debug, Clone, Default)]
pub struct ClusterFaults {
    unreachable: bool,
    owner_lookups: HashSet<String>,
    secret_reads: HashSet<String>,
    secret_patches: HashSet<String>,
    restarts: HashSet<String>,
}

impl ClusterFaults {
    /// Every call fails as if the API server were down.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Looking up this replica set's owner fails.
    #[must_use]
    pub fn fail_owner_lookup(mut self, replica_set: impl Into<String>) -> Self {
        self.owner_lookups.insert(replica_set.into());
        self
    }

    /// Reading this secret fails.
    #[must_use]
    pub fn fail_secret_read(mut self, secret: impl Into<String>) -> Self {
        self.secret_reads.insert(secret.into());
        self
    }

    /// Patching this secret fails.
    #[must_use]
    pub fn fail_secret_patch(mut self, secret: impl Into<String>) -> Self {
        self.secret_patches.insert(secret.into());
        self
    }

    /// Restarting this deployment fails.
    #[must_use]
    pub fn fail_restart(mut self, deployment: impl Into<String>) -> Self {
        self.restarts.insert(deployment.into());
        self
    }
}

/// A [`ClusterClient`] over in-memory namespaces.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    namespaces: RwLock<BTreeMap<String, NamespaceSnapshot>>,
    faults: RwLock<ClusterFaults>,
    secret_reads: AtomicUsize,
    secret_patches: AtomicUsize,
}

impl MemoryCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cluster holding the snapshot's objects.
    #[must_use]
    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Self {
        Self {
            namespaces: RwLock::new(snapshot.namespaces),
            ..Self::default()
        }
    }

    /// Captures the current contents.
    #[must_use]
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            namespaces: read(&self.namespaces).clone(),
        }
    }

    /// Replaces the simulated faults.
    pub fn set_faults(&self, faults: ClusterFaults) {
        *write(&self.faults) = faults;
    }

    /// Appends a pod.
    pub fn insert_pod(&self, namespace: &str, pod: Pod) {
        self.with_namespace(namespace, |ns| ns.pods.push(pod));
    }

    /// Adds a replica set, optionally owned by a deployment.
    pub fn insert_replica_set(&self, namespace: &str, name: &str, deployment: Option<&str>) {
        let owners = deployment
            .map(|d| vec![OwnerReference::new("Deployment", d)])
            .unwrap_or_default();
        self.with_namespace(namespace, |ns| {
            ns.replica_sets.insert(name.to_string(), owners);
        });
    }

    /// Adds a secret from plaintext fields.
    pub fn insert_secret(&self, namespace: &str, name: &str, fields: &[(&str, &str)]) {
        let data = fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), encode_value(value)))
            .collect();
        self.with_namespace(namespace, |ns| {
            ns.secrets.insert(name.to_string(), data);
        });
    }

    /// Adds a secret whose fields are stored exactly as given.
    pub fn insert_raw_secret(&self, namespace: &str, name: &str, fields: &[(&str, &str)]) {
        let data = fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        self.with_namespace(namespace, |ns| {
            ns.secrets.insert(name.to_string(), data);
        });
    }

    /// Adds a deployment with no annotations.
    pub fn insert_deployment(&self, namespace: &str, name: &str) {
        self.with_namespace(namespace, |ns| {
            ns.deployments.insert(name.to_string(), DeploymentSnapshot::default());
        });
    }

    /// Returns a secret field decoded to text.
    #[must_use]
    pub fn secret_field(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
        let namespaces = read(&self.namespaces);
        let encoded = namespaces.get(namespace)?.secrets.get(name)?.get(key)?;
        decode_value(encoded).as_decoded().map(str::to_string)
    }

    /// Returns the restart annotation of a deployment, if set.
    #[must_use]
    pub fn restarted_at(&self, namespace: &str, deployment: &str) -> Option<String> {
        read(&self.namespaces)
            .get(namespace)?
            .deployments
            .get(deployment)?
            .template_annotations
            .get(RESTART_ANNOTATION)
            .cloned()
    }

    /// Number of secret reads served, including failed ones.
    #[must_use]
    pub fn secret_reads(&self) -> usize {
        self.secret_reads.load(Ordering::Relaxed)
    }

    /// Number of secret patches applied.
    #[must_use]
    pub fn secret_patches(&self) -> usize {
        self.secret_patches.load(Ordering::Relaxed)
    }

    fn with_namespace(&self, namespace: &str, f: impl FnOnce(&mut NamespaceSnapshot)) {
        let mut namespaces = write(&self.namespaces);
        f(namespaces.entry(namespace.to_string()).or_default());
    }

    fn check_reachable(&self) -> ClientResult<()> {
        if read(&self.faults).unreachable {
            return Err(ClientError::Unreachable("cluster API is not reachable".to_string()));
        }
        Ok(())
    }
}

impl ClusterClient for MemoryCluster {
    fn list_pods(&self, namespace: &str) -> ClientResult<Vec<Pod>> {
        self.check_reachable()?;
        Ok(read(&self.namespaces)
            .get(namespace)
            .map(|ns| ns.pods.clone())
            .unwrap_or_default())
    }

    fn replica_set_owner(
        &self,
        name: &str,
        namespace: &str,
    ) -> ClientResult<Option<OwnerReference>> {
        self.check_reachable()?;
        if read(&self.faults).owner_lookups.contains(name) {
            return Err(ClientError::Rejected(format!("lookup of replica set {name} failed")));
        }

        read(&self.namespaces)
            .get(namespace)
            .and_then(|ns| ns.replica_sets.get(name))
            .map(|owners| owners.first().cloned())
            .ok_or_else(|| ClientError::not_found("replica set", name))
    }

    fn read_secret(&self, name: &str, namespace: &str) -> ClientResult<SecretData> {
        self.check_reachable()?;
        self.secret_reads.fetch_add(1, Ordering::Relaxed);
        if read(&self.faults).secret_reads.contains(name) {
            return Err(ClientError::AccessDenied(format!("get on secret {name}")));
        }

        read(&self.namespaces)
            .get(namespace)
            .and_then(|ns| ns.secrets.get(name))
            .cloned()
            .ok_or_else(|| ClientError::not_found("secret", name))
    }

    fn patch_secret(&self, name: &str, namespace: &str, data: SecretData) -> ClientResult<()> {
        self.check_reachable()?;
        if read(&self.faults).secret_patches.contains(name) {
            return Err(ClientError::Rejected(format!("patch of secret {name} refused")));
        }

        let mut namespaces = write(&self.namespaces);
        let secret = namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.secrets.get_mut(name))
            .ok_or_else(|| ClientError::not_found("secret", name))?;
        secret.extend(data);
        self.secret_patches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn patch_deployment_restart(
        &self,
        name: &str,
        namespace: &str,
        restarted_at: DateTime<Utc>,
    ) -> ClientResult<()> {
        self.check_reachable()?;
        if read(&self.faults).restarts.contains(name) {
            return Err(ClientError::Rejected(format!("patch of deployment {name} refused")));
        }

        let mut namespaces = write(&self.namespaces);
        let deployment = namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.deployments.get_mut(name))
            .ok_or_else(|| ClientError::not_found("deployment", name))?;
        deployment
            .template_annotations
            .insert(RESTART_ANNOTATION.to_string(), restarted_at.to_rfc3339());
        Ok(())
    }
}

/// Combined vault and cluster state, as stored in a state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    /// Vault contents.
    pub vault: VaultSnapshot,
    /// Cluster contents.
    pub cluster: ClusterSnapshot,
}

impl StateSnapshot {
    /// Reads a state file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Writes a state file, pretty-printed.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Builds live clients from this state.
    #[must_use]
    pub fn into_clients(self) -> (MemoryVault, MemoryCluster) {
        (
            MemoryVault::from_snapshot(self.vault),
            MemoryCluster::from_snapshot(self.cluster),
        )
    }

    /// Captures the state of live clients.
    #[must_use]
    pub fn capture(vault: &MemoryVault, cluster: &MemoryCluster) -> Self {
        Self {
            vault: vault.snapshot(),
            cluster: cluster.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Container;

    #[test]
    fn vault_set_secret_bumps_version() {
        let vault = MemoryVault::new();
        vault.insert("db", "v1", None);

        vault.set_secret("db", "v2", None).expect("set should succeed");
        vault.set_secret("new", "n1", None).expect("set should succeed");

        assert_eq!(vault.version("db"), Some(2));
        assert_eq!(vault.value("db").as_deref(), Some("v2"));
        assert_eq!(vault.version("new"), Some(1));
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn disabled_secret_value_is_denied() {
        let mut snapshot = VaultSnapshot::default();
        snapshot.secrets.push(StoredSecret {
            name: "off".to_string(),
            value: "x".to_string(),
            enabled: false,
            updated_on: None,
            expires_on: None,
            version: 1,
        });
        let vault = MemoryVault::from_snapshot(snapshot);

        assert!(matches!(vault.get_secret_value("off"), Err(ClientError::AccessDenied(_))));
    }

    #[test]
    fn vault_faults_apply() {
        let vault = MemoryVault::new();
        vault.insert("db", "v1", None);

        vault.set_faults(VaultFaults::default().reject_writes());
        assert!(matches!(vault.set_secret("db", "v2", None), Err(ClientError::Rejected(_))));
        assert_eq!(vault.value("db").as_deref(), Some("v1"));

        vault.set_faults(VaultFaults::default().unreachable());
        assert!(matches!(vault.list_secret_metadata(), Err(ClientError::Unreachable(_))));
    }

    #[test]
    fn cluster_patch_merges_fields() {
        let cluster = MemoryCluster::new();
        cluster.insert_secret("ns", "creds", &[("password", "a"), ("user", "u")]);

        let patch = SecretData::from([("password".to_string(), encode_value("b"))]);
        cluster.patch_secret("creds", "ns", patch).expect("patch should succeed");

        assert_eq!(cluster.secret_field("ns", "creds", "password").as_deref(), Some("b"));
        assert_eq!(cluster.secret_field("ns", "creds", "user").as_deref(), Some("u"));
        assert_eq!(cluster.secret_patches(), 1);
    }

    #[test]
    fn cluster_missing_objects_are_not_found() {
        let cluster = MemoryCluster::new();
        assert!(matches!(cluster.read_secret("x", "ns"), Err(ClientError::NotFound { .. })));
        assert!(matches!(
            cluster.patch_deployment_restart("x", "ns", Utc::now()),
            Err(ClientError::NotFound { .. })
        ));
        assert!(matches!(cluster.replica_set_owner("x", "ns"), Err(ClientError::NotFound { .. })));
        assert!(cluster.list_pods("ns").expect("list").is_empty());
    }

    #[test]
    fn restart_sets_annotation() {
        let cluster = MemoryCluster::new();
        cluster.insert_deployment("ns", "api");
        let at = Utc::now();

        cluster.patch_deployment_restart("api", "ns", at).expect("restart");

        assert_eq!(cluster.restarted_at("ns", "api"), Some(at.to_rfc3339()));
    }

    #[test]
    fn state_snapshot_round_trips_through_file() {
        let vault = MemoryVault::new();
        vault.insert("db-password", "s3cret", None);
        let cluster = MemoryCluster::new();
        cluster.insert_secret("default", "db-creds", &[("password", "s3cret")]);
        cluster.insert_replica_set("default", "api-1", Some("api"));
        cluster.insert_pod(
            "default",
            Pod::new("api-1-x").with_container(
                Container::new("app").with_secret_ref("P", "db-creds", "password"),
            ),
        );

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("state.json");
        let state = StateSnapshot::capture(&vault, &cluster);
        state.to_file(&path).expect("write state");

        let loaded = StateSnapshot::from_file(&path).expect("read state");
        assert_eq!(loaded, state);

        let (vault, cluster) = loaded.into_clients();
        assert_eq!(vault.value("db-password").as_deref(), Some("s3cret"));
        assert_eq!(cluster.list_pods("default").expect("list").len(), 1);
    }
}
