//! Scheduled administrative operations for vigil.
//!
//! Restart and stop countdowns with in-game announcements, the cron-driven
//! periodic restart, and the RCON client that delivers the announcements.
#![deny(unused_crate_dependencies)]

pub mod error;
pub mod operation;
pub mod rcon;

pub use error::OperationError;
pub use operation::{
    OperationContext, OperationManager, OperationScheduler, PeriodicTrigger, StartOutcome,
    StartParams,
};
pub use rcon::RconClient;
