//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use drift_engine::ScanView;

/// secret-drift - find workload secrets that drifted from the vault, and rotate them.
#[derive(Parser, Debug, Clone)]
#[command(name = "secret-drift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// State file holding the vault inventory and cluster objects.
    #[arg(short, long, env = "SECRET_DRIFT_STATE", default_value = "drift-state.json")]
    pub state: PathBuf,

    /// Engine configuration file (JSON).
    #[arg(short, long, env = "SECRET_DRIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Correlate a namespace's secret usage with the vault.
    Scan(ScanArgs),

    /// Rotate a vault secret and propagate it to a workload.
    Rotate(RotateArgs),

    /// Show the rotation audit trail.
    Audit(AuditArgs),
}

/// Which part of a scan to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ViewArg {
    /// Vault inventory and workload usage.
    #[default]
    All,
    /// Vault inventory only.
    Vault,
    /// Workload usage only.
    Workloads,
}

impl From<ViewArg> for ScanView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::All => Self::All,
            ViewArg::Vault => Self::Vault,
            ViewArg::Workloads => Self::Workloads,
        }
    }
}

/// Arguments for the scan command.
#[derive(Parser, Debug, Clone)]
pub struct ScanArgs {
    /// Namespace to scan; defaults to the configured namespace.
    #[arg(short, long, env = "SECRET_DRIFT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Part of the scan to print.
    #[arg(long, value_enum, default_value_t = ViewArg::All)]
    pub view: ViewArg,

    /// Print secret values instead of masking them.
    #[arg(long)]
    pub show_values: bool,
}

/// Arguments for the rotate command.
#[derive(Parser, Debug, Clone)]
pub struct RotateArgs {
    /// Vault secret to rotate.
    #[arg(required = true)]
    pub vault_secret: String,

    /// Workload secret object to patch with the new value.
    #[arg(short, long)]
    pub workload_secret: Option<String>,

    /// Deployment to restart after patching.
    #[arg(short, long)]
    pub deployment: Option<String>,

    /// Namespace of the workload secret and deployment.
    #[arg(short, long, env = "SECRET_DRIFT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Use this value instead of generating one.
    #[arg(long)]
    pub value: Option<String>,

    /// Expiry of the new version (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub expires: Option<String>,

    /// Account recorded in the audit trail.
    #[arg(long, default_value = "local")]
    pub account: String,

    /// JSON-lines file the audit entry is appended to.
    #[arg(long, env = "SECRET_DRIFT_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,
}

/// Arguments for the audit command.
#[derive(Parser, Debug, Clone)]
pub struct AuditArgs {
    /// JSON-lines audit file to read.
    #[arg(long, env = "SECRET_DRIFT_AUDIT_LOG")]
    pub audit_log: PathBuf,

    /// Only entries for this secret.
    #[arg(long)]
    pub secret: Option<String>,

    /// Only entries for this account.
    #[arg(long)]
    pub account: Option<String>,

    /// Only failed rotations.
    #[arg(long)]
    pub failed: bool,

    /// Maximum number of entries.
    #[arg(short, long)]
    pub limit: Option<usize>,
}
