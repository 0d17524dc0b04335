//! Core types shared by the scanner, correlator and rotation workflow.
//!
//! - [`VaultSecret`]: a vault inventory entry with its derived expiry health
//! - [`UsageRecord`]: one observed consumption of a workload secret
//! - [`CorrelationRow`]: a usage record reconciled against the vault
//! - [`RotationOutcome`]: the flattened result of a rotation

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Sentinel shown in place of a vault value that could not be read.
pub const ACCESS_DENIED_SENTINEL: &str = "**ACCESS DENIED**";

/// Sentinel shown in place of a workload value that could not be decoded.
pub const DECODE_ERROR_SENTINEL: &str = "**DECODE ERROR**";

/// Health of a secret relative to its expiry timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExpiryStatus {
    /// No expiry, or more than a week left.
    Healthy,
    /// Between three and seven days left.
    Warning,
    /// Two days or less left.
    Critical,
    /// Already past its expiry.
    Expired,
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Warning => write!(f, "Warning"),
            Self::Critical => write!(f, "Critical"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

/// The value half of a vault inventory entry.
///
/// Debug output never shows the payload.
#[derive(Clone, PartialEq, Eq)]
pub enum VaultValue {
    /// The current payload.
    Plain(String),
    /// The payload could not be fetched.
    AccessDenied,
}

impl VaultValue {
    /// Returns the payload if it was readable.
    #[must_use]
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain(value) => Some(value),
            Self::AccessDenied => None,
        }
    }

    /// Returns the payload, or the access-denied sentinel.
    #[must_use]
    pub fn as_display_str(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::AccessDenied => ACCESS_DENIED_SENTINEL,
        }
    }
}

impl fmt::Debug for VaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f
                .debug_struct("Plain")
                .field("len", &value.len())
                .field("data", &"[REDACTED]")
                .finish(),
            Self::AccessDenied => write!(f, "AccessDenied"),
        }
    }
}

impl Serialize for VaultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_display_str())
    }
}

/// A secret as listed from the vault, with derived expiry health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultSecret {
    /// Name, unique within the vault.
    pub name: String,
    /// Current value, or the access-denied marker.
    pub value: VaultValue,
    /// Whether the secret is enabled.
    pub enabled: bool,
    /// When the current version was written.
    pub updated_on: Option<DateTime<Utc>>,
    /// When the secret expires, if ever.
    pub expires_on: Option<DateTime<Utc>>,
    /// Health derived from `expires_on`.
    pub expiry_status: ExpiryStatus,
    /// Whole days left; 0 once expired, `None` without expiry.
    pub days_remaining: Option<i64>,
}

/// How a pod consumes a workload secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mechanism {
    /// Mounted as a volume.
    Volume,
    /// Referenced from a container environment variable.
    EnvVar,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume => write!(f, "Volume"),
            Self::EnvVar => write!(f, "EnvVar"),
        }
    }
}

/// A value a workload resolved from its secret object.
#[derive(Clone, PartialEq, Eq)]
pub enum ConsumedValue {
    /// Base64 decoded into UTF-8 text.
    Decoded(String),
    /// The stored bytes were not valid base64 or not UTF-8.
    DecodeError,
}

impl ConsumedValue {
    /// Returns the decoded text, if decoding worked.
    #[must_use]
    pub fn as_decoded(&self) -> Option<&str> {
        match self {
            Self::Decoded(value) => Some(value),
            Self::DecodeError => None,
        }
    }

    /// Returns the decoded text, or the decode-error sentinel.
    #[must_use]
    pub fn as_display_str(&self) -> &str {
        match self {
            Self::Decoded(value) => value,
            Self::DecodeError => DECODE_ERROR_SENTINEL,
        }
    }
}

impl fmt::Debug for ConsumedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoded(value) => f
                .debug_struct("Decoded")
                .field("len", &value.len())
                .field("data", &"[REDACTED]")
                .finish(),
            Self::DecodeError => write!(f, "DecodeError"),
        }
    }
}

impl Serialize for ConsumedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_display_str())
    }
}

/// One observed consumption of a workload secret by a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    /// Pod that consumes the secret.
    pub pod: String,
    /// Deployment owning the pod, when the owner chain resolved.
    pub deployment: Option<String>,
    /// How the secret is consumed.
    pub mechanism: Mechanism,
    /// Name of the workload secret object.
    pub secret_name: String,
    /// Referenced key; only set for [`Mechanism::EnvVar`].
    pub key: Option<String>,
    /// Resolved value; never set for [`Mechanism::Volume`].
    pub value: Option<ConsumedValue>,
}

impl UsageRecord {
    /// Creates a volume usage record.
    #[must_use]
    pub fn volume(
        pod: impl Into<String>,
        deployment: Option<String>,
        secret_name: impl Into<String>,
    ) -> Self {
        Self {
            pod: pod.into(),
            deployment,
            mechanism: Mechanism::Volume,
            secret_name: secret_name.into(),
            key: None,
            value: None,
        }
    }

    /// Creates an environment-variable usage record.
    #[must_use]
    pub fn env_var(
        pod: impl Into<String>,
        deployment: Option<String>,
        secret_name: impl Into<String>,
        key: impl Into<String>,
        value: Option<ConsumedValue>,
    ) -> Self {
        Self {
            pod: pod.into(),
            deployment,
            mechanism: Mechanism::EnvVar,
            secret_name: secret_name.into(),
            key: Some(key.into()),
            value,
        }
    }
}

/// Correlation verdict for one usage record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "vault_secret")]
pub enum AkvStatus {
    /// Nothing in the vault could be associated.
    Unknown,
    /// Byte-identical to the named vault secret.
    Synced(String),
    /// Name-associated with the named vault secret, value not equal.
    Drift(String),
}

impl AkvStatus {
    /// Returns the vault secret this status points at.
    #[must_use]
    pub fn vault_name(&self) -> Option<&str> {
        match self {
            Self::Unknown => None,
            Self::Synced(name) | Self::Drift(name) => Some(name),
        }
    }
}

impl fmt::Display for AkvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown (No Mapping)"),
            Self::Synced(name) => write!(f, "Synced with: {name}"),
            Self::Drift(name) => write!(f, "Drift: {name}"),
        }
    }
}

/// A usage record reconciled against the vault inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationRow {
    /// Pod that consumes the secret.
    pub pod: String,
    /// Deployment owning the pod, if resolved.
    pub deployment: Option<String>,
    /// How the secret is consumed.
    pub mechanism: Mechanism,
    /// Workload secret object name.
    pub workload_secret: String,
    /// Correlation verdict.
    pub akv_status: AkvStatus,
    /// Matched vault secret name.
    pub vault_name_ref: Option<String>,
    /// Matched vault secret value.
    pub vault_value: Option<VaultValue>,
    /// Expiry health of the matched vault secret.
    pub vault_expiry_status: Option<ExpiryStatus>,
    /// Days remaining on the matched vault secret.
    pub days_remaining: Option<i64>,
}

/// Flattened result of a rotation, as stored by the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationOutcome {
    /// Whether the vault was updated.
    pub success: bool,
    /// Human-readable detail, including degraded-success notes.
    pub message: String,
}

impl RotationOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
