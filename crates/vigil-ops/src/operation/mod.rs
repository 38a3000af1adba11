//! Administrative operations.
//!
//! # Structure
//!
//! - `scheduler` - countdown and cron lifecycle of one operation
//! - `manager` - registry by name with foreground exclusivity

mod manager;
mod scheduler;

#[cfg(test)]
mod test_support;

pub use manager::{OperationManager, PERIODIC_USER, StartOutcome, StartParams};
pub use scheduler::{MINUTE_MS, OperationContext, OperationScheduler, PeriodicTrigger};
