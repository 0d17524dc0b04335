//! # Drift Engine
//!
//! Tracks whether the secrets workloads consume at runtime match the
//! canonical values in a secret vault, and rotates a secret across both
//! systems:
//!
//! - **Inventory**: lists vault secrets with their expiry health
//! - **Scanning**: finds every secret a namespace's pods consume through
//!   volumes or environment variables
//! - **Correlation**: classifies each usage as synced, drifted or unknown
//! - **Rotation**: vault update, workload secret patch and rolling restart,
//!   forward-only with explicit degraded outcomes
//!
//! ## Example
//!
//! ```rust
//! use drift_engine::{
//!     AkvStatus, Container, EngineConfig, MemoryCluster, MemoryVault, Pod, SecretEngine,
//! };
//!
//! let vault = MemoryVault::new();
//! vault.insert("db-password", "s3cret", None);
//!
//! let cluster = MemoryCluster::new();
//! cluster.insert_secret("default", "db-creds", &[("password", "s3cret")]);
//! cluster.insert_pod(
//!     "default",
//!     Pod::new("api-0").with_container(
//!         Container::new("app").with_secret_ref("DB_PASSWORD", "db-creds", "password"),
//!     ),
//! );
//!
//! let config = EngineConfig::default();
//! let engine = SecretEngine::new(&vault, &cluster, &config);
//! let report = engine.scan_and_correlate("default");
//!
//! assert_eq!(report.rows[0].akv_status, AkvStatus::Synced("db-password".into()));
//! ```
//!
//! ## Failure model
//!
//! Scans never fail: an unreachable backend yields an empty result and
//! per-item failures become sentinels. Rotation only fails when the vault
//! write fails; workload patch and restart failures leave it
//! [`RotationStatus::Degraded`].

pub mod audit;
pub mod client;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod inventory;
pub mod memory;
pub mod rotation;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{ClientError, Error, Result};
pub use types::{
    ACCESS_DENIED_SENTINEL, AkvStatus, ConsumedValue, CorrelationRow, DECODE_ERROR_SENTINEL,
    ExpiryStatus, Mechanism, RotationOutcome, UsageRecord, VaultSecret, VaultValue,
};

pub use client::{
    ClusterClient, Container, EnvVar, OwnerReference, Pod, SecretData, SecretProperties,
    VaultClient,
};

pub use config::EngineConfig;

pub use engine::{ScanReport, ScanSummary, ScanView, SecretEngine};

pub use rotation::{
    RotationReport, RotationRequest, RotationStatus, SecretGenerator, StepStatus,
    parse_expiry_date,
};

pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, AuditSink, AuditStatus};

pub use memory::{ClusterFaults, MemoryCluster, MemoryVault, StateSnapshot, VaultFaults};
