//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server, follow its log and accept console commands on stdin
    Run,

    /// Decode an existing server log and print its events as JSON lines
    Decode {
        /// Log file to decode
        file: PathBuf,
    },

    /// Load and validate the configuration
    CheckConfig,
}
