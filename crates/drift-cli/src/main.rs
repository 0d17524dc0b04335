//! secret-drift binary entrypoint.
//!
//! This is the main entry point for the `secret-drift` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use drift_cli::cli::{Cli, Commands, LogFormat};
use drift_cli::commands::{AuditCommand, RotateCommand, ScanCommand};
use drift_cli::output::OutputFormat;
use drift_engine::EngineConfig;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig, drift_cli::CliError> {
    match &cli.config {
        Some(path) => Ok(EngineConfig::from_file(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn run(cli: Cli) -> Result<(), drift_cli::CliError> {
    let config = load_config(&cli)?;
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Scan(args) => {
            let cmd = ScanCommand::new(&cli.state, &config);
            cmd.execute(&mut stdout, &format, args)?;
        }
        Commands::Rotate(args) => {
            let cmd = RotateCommand::new(&cli.state, &config);
            cmd.execute(&mut stdout, &format, args)?;
        }
        Commands::Audit(args) => {
            let cmd = AuditCommand::new();
            cmd.execute(&mut stdout, &format, args)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_cli::cli::{Format, ViewArg};

    #[test]
    fn cli_parses_scan() {
        let cli = Cli::parse_from(["secret-drift", "scan", "-n", "payments", "--view", "vault"]);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.namespace.as_deref(), Some("payments"));
                assert_eq!(args.view, ViewArg::Vault);
                assert!(!args.show_values);
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn cli_parses_rotate() {
        let cli = Cli::parse_from([
            "secret-drift",
            "rotate",
            "db-password",
            "-w",
            "db-creds",
            "-d",
            "api",
            "--expires",
            "2026-12-31",
        ]);
        match cli.command {
            Commands::Rotate(args) => {
                assert_eq!(args.vault_secret, "db-password");
                assert_eq!(args.workload_secret.as_deref(), Some("db-creds"));
                assert_eq!(args.deployment.as_deref(), Some("api"));
                assert_eq!(args.expires.as_deref(), Some("2026-12-31"));
                assert_eq!(args.account, "local");
            }
            _ => panic!("expected rotate command"),
        }
    }

    #[test]
    fn cli_rotate_requires_secret_name() {
        assert!(Cli::try_parse_from(["secret-drift", "rotate"]).is_err());
    }

    #[test]
    fn cli_respects_format_flag() {
        let cli = Cli::parse_from(["secret-drift", "--format", "json", "scan"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn cli_respects_state_flag() {
        let cli = Cli::parse_from(["secret-drift", "-s", "/tmp/state.json", "scan"]);
        assert_eq!(cli.state, std::path::PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn run_scan_without_state_file_fails() {
        let cli = Cli::parse_from(["secret-drift", "-s", "/nonexistent/drift-state.json", "scan"]);
        assert!(run(cli).is_err());
    }

    #[test]
    fn run_with_invalid_config_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config.json");
        std::fs::write(&config, r#"{"generated_length": 0}"#).expect("write config");

        let cli = Cli::parse_from([
            "secret-drift",
            "-c",
            config.to_str().expect("utf-8 path"),
            "scan",
        ]);
        assert!(run(cli).is_err());
    }
}
