//! Spatial Assembly CLI
//!
//! Command-line interface for building and inspecting spatial stores.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spatial_assembly::cli::{commands, Cli, Commands};
use spatial_assembly::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("spatial_assembly={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Spatial Assembly v{}", env!("CARGO_PKG_VERSION"));

    match handle_command(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = err.error_code(), "{err}");
            for suggestion in err.recovery_suggestions() {
                eprintln!("  hint: {suggestion}");
            }
            ExitCode::FAILURE
        }
    }
}

fn handle_command(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::Assemble(args) => commands::assemble(&args.assembly_config()),
        Commands::Inspect { path } => commands::inspect(path),
    }
}
