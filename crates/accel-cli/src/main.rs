//! accel-select CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use accel_cli::cli::{Cli, Commands};
use accel_cli::commands::{ListCommand, ParseVersionCommand, SelectCommand};
use accel_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(status) = e.status() {
                debug!(%status, "selection status");
            }
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), accel_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Select => {
            let cmd = SelectCommand::new(cli.inventory_path()?, cli.selection_config()?);
            cmd.execute(&mut stdout, &format)?;
        }
        Commands::List => {
            let cmd = ListCommand::new(cli.inventory_path()?, cli.selection_config()?);
            cmd.execute(&mut stdout, &format)?;
        }
        Commands::ParseVersion { input } => {
            let cmd = ParseVersionCommand::new(input.as_str());
            cmd.execute(&mut stdout, &format)?;
        }
    }

    Ok(())
}
