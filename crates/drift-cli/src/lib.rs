//! # drift-cli
//!
//! Operator CLI for the drift engine.
//!
//! Provides commands for:
//! - Scanning a namespace and correlating its secret usage with the vault
//! - Rotating a secret across the vault, a workload secret and a deployment
//! - Reading the rotation audit trail
//!
//! The CLI works against a JSON state file holding a vault inventory and
//! cluster objects. Rotations write the updated state back to that file.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, LogFormat};
pub use error::CliError;
pub use output::OutputFormat;
