//! CLI entry point - the composition root.
//!
//! Logging and configuration are set up here; commands are dispatched to
//! handlers which receive a [`CliContext`](vigil_cli::CliContext).

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigil_cli::{Cli, CliError, Commands, bootstrap, handlers, load_config};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Decode { file } => {
            let count = handlers::decode::execute(&file, &mut std::io::stdout().lock())?;
            tracing::info!(count, "Decoded events");
        }
        Commands::CheckConfig => {
            let config = load_config(cli.config.as_deref())?;
            handlers::check_config::execute(&config, &mut std::io::stdout().lock())?;
        }
        Commands::Run => {
            let config = load_config(cli.config.as_deref())?;
            let ctx = bootstrap(config).await?;
            handlers::run::execute(&ctx).await?;
        }
    }
    Ok(())
}
