//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`scan`] - Vault inventory and workload drift report
//! - [`rotate`] - Secret rotation across vault and workload
//! - [`audit`] - Rotation audit trail

pub mod audit;
pub mod rotate;
pub mod scan;

pub use audit::AuditCommand;
pub use rotate::RotateCommand;
pub use scan::ScanCommand;

use std::path::Path;

use drift_engine::StateSnapshot;
use tracing::debug;

use crate::error::CliError;

/// Reads the state file a command runs against.
pub(crate) fn load_state(path: &Path) -> Result<StateSnapshot, CliError> {
    debug!(path = %path.display(), "loading state");
    StateSnapshot::from_file(path).map_err(|e| {
        CliError::Command(format!("cannot load state file {}: {e}", path.display()))
    })
}
