//! Command-line supervisor for a dedicated game server.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]


// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliContext, bootstrap, load_config};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
