//! Capability interfaces for the vault and the workload cluster.
//!
//! The engine never talks to an SDK directly. Callers construct a client
//! per request and hand it to [`crate::SecretEngine`]; [`crate::memory`]
//! provides snapshot-backed implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Result type for capability calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Secret data as stored on the cluster: field name to base64 text.
pub type SecretData = BTreeMap<String, String>;

/// Listing metadata for one vault secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretProperties {
    /// Secret name.
    pub name: String,
    /// Whether the secret is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When the current version was written.
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
    /// Expiry of the current version.
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
}

const fn default_enabled() -> bool {
    true
}

/// Read/write access to the secret vault.
pub trait VaultClient {
    /// Lists metadata for every secret, in the vault's listing order.
    fn list_secret_metadata(&self) -> ClientResult<Vec<SecretProperties>>;

    /// Fetches the current value of a secret.
    fn get_secret_value(&self, name: &str) -> ClientResult<String>;

    /// Writes a new version of a secret.
    fn set_secret(
        &self,
        name: &str,
        value: &str,
        expires_on: Option<DateTime<Utc>>,
    ) -> ClientResult<()>;
}

/// Read and patch access to the workload cluster.
pub trait ClusterClient {
    /// Lists pods in a namespace.
    fn list_pods(&self, namespace: &str) -> ClientResult<Vec<Pod>>;

    /// Returns the first owner of a `ReplicaSet`, if it has one.
    fn replica_set_owner(&self, name: &str, namespace: &str)
        -> ClientResult<Option<OwnerReference>>;

    /// Reads a secret object's data.
    fn read_secret(&self, name: &str, namespace: &str) -> ClientResult<SecretData>;

    /// Merges the given fields into a secret object's data.
    fn patch_secret(&self, name: &str, namespace: &str, data: SecretData) -> ClientResult<()>;

    /// Stamps a deployment's pod template with a restart timestamp.
    fn patch_deployment_restart(
        &self,
        name: &str,
        namespace: &str,
        restarted_at: DateTime<Utc>,
    ) -> ClientResult<()>;
}

/// Pod template annotation used to force a rolling restart.
pub const RESTART_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Owner kind that links a pod to its deployment.
pub const REPLICA_SET_KIND: &str = "ReplicaSet";

/// The parts of a pod the scanner reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Pod name.
    pub name: String,
    /// Set once the pod is terminating.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// Owners of the pod.
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    /// Pod volumes.
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Pod containers.
    #[serde(default)]
    pub containers: Vec<Container>,
}

impl Pod {
    /// Creates a running pod with no owners, volumes or containers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an owner reference.
    #[must_use]
    pub fn with_owner(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_references.push(OwnerReference::new(kind, name));
        self
    }

    /// Adds a volume backed by a secret.
    #[must_use]
    pub fn with_secret_volume(
        mut self,
        volume: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.volumes.push(Volume {
            name: volume.into(),
            secret: Some(SecretVolumeSource {
                secret_name: secret.into(),
            }),
        });
        self
    }

    /// Adds a container.
    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    /// Marks the pod as terminating.
    #[must_use]
    pub fn terminating(mut self, at: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(at);
        self
    }

    /// Returns true once deletion has been requested.
    #[must_use]
    pub const fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// Reference from an object to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    /// Owner kind, e.g. `ReplicaSet`.
    pub kind: String,
    /// Owner name.
    pub name: String,
}

impl OwnerReference {
    /// Creates an owner reference.
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// A pod volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name.
    pub name: String,
    /// Set when the volume mounts a secret.
    #[serde(default)]
    pub secret: Option<SecretVolumeSource>,
}

/// Secret backing a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVolumeSource {
    /// Name of the secret object.
    pub secret_name: String,
}

/// A container and its environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Container name.
    pub name: String,
    /// Environment variables.
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

impl Container {
    /// Creates a container with no environment.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: Vec::new(),
        }
    }

    /// Adds a literal environment variable.
    #[must_use]
    pub fn with_literal(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        });
        self
    }

    /// Adds an environment variable sourced from a secret key.
    #[must_use]
    pub fn with_secret_ref(
        mut self,
        name: impl Into<String>,
        secret: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.env.push(EnvVar {
            name: name.into(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.into(),
                    key: key.into(),
                }),
            }),
        });
        self
    }
}

/// A container environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Literal value.
    #[serde(default)]
    pub value: Option<String>,
    /// Indirect source.
    #[serde(default)]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Returns the secret key selector, if the variable reads a secret.
    #[must_use]
    pub fn secret_key_ref(&self) -> Option<&SecretKeySelector> {
        self.value_from.as_ref()?.secret_key_ref.as_ref()
    }
}

/// Indirect source of an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarSource {
    /// Set when the variable reads a secret key.
    #[serde(default)]
    pub secret_key_ref: Option<SecretKeySelector>,
}

/// Selects one key of a secret object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    /// Secret object name.
    pub name: String,
    /// Field within the secret.
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_builder_collects_parts() {
        let pod = Pod::new("api-7d4-x")
            .with_owner(REPLICA_SET_KIND, "api-7d4")
            .with_secret_volume("certs", "api-tls")
            .with_container(
                Container::new("app")
                    .with_literal("MODE", "prod")
                    .with_secret_ref("DB_PASSWORD", "db-creds", "password"),
            );

        assert_eq!(pod.owner_references.len(), 1);
        assert_eq!(pod.volumes[0].secret.as_ref().map(|s| s.secret_name.as_str()), Some("api-tls"));
        assert!(pod.containers[0].env[0].secret_key_ref().is_none());
        let selector = pod.containers[0].env[1].secret_key_ref().expect("secret ref");
        assert_eq!(selector.name, "db-creds");
        assert_eq!(selector.key, "password");
        assert!(!pod.is_terminating());
    }

    #[test]
    fn pod_deserializes_with_missing_fields() {
        let pod: Pod = serde_json::from_str(r#"{"name": "bare"}"#).expect("valid pod");
        assert_eq!(pod, Pod::new("bare"));
    }

    #[test]
    fn secret_properties_default_to_enabled() {
        let props: SecretProperties =
            serde_json::from_str(r#"{"name": "db-password"}"#).expect("valid properties");
        assert!(props.enabled);
        assert!(props.expires_on.is_none());
    }
}
