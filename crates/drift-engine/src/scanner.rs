//! Workload usage scanning.
//!
//! Walks every running pod in a namespace and records each secret it
//! consumes through a volume mount or an environment variable. Failures
//! are contained at the smallest scope they affect: an owner lookup only
//! loses that pod's deployment name, an unreadable secret only loses the
//! values read from it.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use crate::client::{ClusterClient, Pod, REPLICA_SET_KIND, SecretData};
use crate::error::ClientError;
use crate::types::{ConsumedValue, UsageRecord};

/// Scans pods for secret consumption through a [`ClusterClient`].
pub struct UsageScanner<'a, C: ClusterClient + ?Sized> {
    cluster: &'a C,
}

impl<'a, C: ClusterClient + ?Sized> UsageScanner<'a, C> {
    /// Creates a scanner over the given cluster handle.
    #[must_use]
    pub const fn new(cluster: &'a C) -> Self {
        Self { cluster }
    }

    /// Scans a namespace, returning an empty list if pods cannot be listed.
    #[must_use]
    pub fn scan(&self, namespace: &str) -> Vec<UsageRecord> {
        match self.try_scan(namespace) {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    namespace = %namespace,
                    error = %err,
                    "pod listing failed; reporting no usage"
                );
                Vec::new()
            }
        }
    }

    /// Scans a namespace, returning the listing error if pods cannot be listed.
    pub fn try_scan(&self, namespace: &str) -> Result<Vec<UsageRecord>, ClientError> {
        let pods = self.cluster.list_pods(namespace)?;

        // One read per distinct secret name for the whole scan.
        let mut secret_cache: HashMap<String, SecretData> = HashMap::new();
        let mut records = Vec::new();

        for pod in pods.iter().filter(|pod| !pod.is_terminating()) {
            let deployment = self.resolve_deployment(pod, namespace);

            for volume in &pod.volumes {
                if let Some(source) = &volume.secret {
                    records.push(UsageRecord::volume(
                        pod.name.clone(),
                        deployment.clone(),
                        source.secret_name.clone(),
                    ));
                }
            }

            for env in pod.containers.iter().flat_map(|c| c.env.iter()) {
                let Some(selector) = env.secret_key_ref() else {
                    continue;
                };

                let data = secret_cache
                    .entry(selector.name.clone())
                    .or_insert_with(|| self.read_secret_or_empty(&selector.name, namespace));
                let value = data.get(&selector.key).map(|encoded| decode_value(encoded));

                records.push(UsageRecord::env_var(
                    pod.name.clone(),
                    deployment.clone(),
                    selector.name.clone(),
                    selector.key.clone(),
                    value,
                ));
            }
        }

        info!(
            namespace = %namespace,
            pods = pods.len(),
            usages = records.len(),
            secrets_read = secret_cache.len(),
            "workload scan complete"
        );
        Ok(records)
    }

    /// Follows pod -> `ReplicaSet` -> owner. Any failure yields `None`.
    fn resolve_deployment(&self, pod: &Pod, namespace: &str) -> Option<String> {
        let replica_set = pod
            .owner_references
            .iter()
            .find(|owner| owner.kind == REPLICA_SET_KIND)?;

        match self.cluster.replica_set_owner(&replica_set.name, namespace) {
            Ok(owner) => owner.map(|owner| owner.name),
            Err(err) => {
                debug!(
                    pod = %pod.name,
                    replica_set = %replica_set.name,
                    error = %err,
                    "owner lookup failed"
                );
                None
            }
        }
    }

    fn read_secret_or_empty(&self, name: &str, namespace: &str) -> SecretData {
        self.cluster.read_secret(name, namespace).unwrap_or_else(|err| {
            debug!(secret = %name, namespace = %namespace, error = %err, "secret unreadable");
            SecretData::new()
        })
    }
}

/// Decodes a base64 secret field into UTF-8 text.
#[must_use]
pub fn decode_value(encoded: &str) -> ConsumedValue {
    STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map_or(ConsumedValue::DecodeError, ConsumedValue::Decoded)
}

/// Encodes text the way secret fields are stored.
#[must_use]
pub fn encode_value(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}
