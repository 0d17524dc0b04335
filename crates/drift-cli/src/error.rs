//! CLI error types.

use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine rejected configuration or failed to load state.
    #[error(transparent)]
    Engine(#[from] drift_engine::Error),

    /// A command ran but did not succeed.
    #[error("command error: {0}")]
    Command(String),

    /// Output formatting failed.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
