//! AgentHive CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Connection error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hive_client::ClientError;

mod commands;

use commands::{Cli, Commands, Context};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONNECTION_ERROR: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "hive=debug,warn"
    } else if cli.quiet {
        "warn"
    } else {
        "hive=info,warn"
    };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let ctx = Context::from_cli(&cli);

    let result = match cli.command {
        Commands::Sessions(args) => commands::sessions::execute(args, &ctx).await,
        Commands::Send(args) => commands::send::execute(args, &ctx).await,
        Commands::Health(args) => commands::health::execute(args, &ctx).await,
        Commands::Normalize(args) => commands::normalize::execute(args, &ctx).await,
        Commands::Prefs(args) => commands::prefs::execute(args, &ctx).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let client_error = e.chain().find_map(|c| c.downcast_ref::<ClientError>());
    match client_error {
        Some(err) if err.is_connection() => return ExitCodes::CONNECTION_ERROR,
        Some(ClientError::InvalidConfig(_)) => return ExitCodes::INVALID_ARGS,
        _ => {}
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("connection") || msg.contains("unreachable") {
        ExitCodes::CONNECTION_ERROR
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_connection_errors_map_to_exit_3() {
        let err = anyhow::Error::new(ClientError::Timeout(Duration::from_secs(3)))
            .context("Health check failed");
        assert_eq!(categorize_error(&err), ExitCodes::CONNECTION_ERROR);
    }

    #[test]
    fn test_invalid_config_maps_to_exit_2() {
        let err = anyhow::Error::new(ClientError::InvalidConfig("bad url".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_other_errors_are_general() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }
}
