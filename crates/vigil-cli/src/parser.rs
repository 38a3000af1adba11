//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Supervise a dedicated game server and schedule restarts.
#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Dedicated game server supervisor")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
