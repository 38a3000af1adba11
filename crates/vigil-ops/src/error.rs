//! Operation error types.

use thiserror::Error;
use vigil_core::OperationType;

/// Errors from scheduling, starting or cancelling operations.
///
/// All of these are raised before any state changes.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Invalid timezone '{0}'")]
    InvalidTimezone(String),

    #[error("No operation defined for '{0}'")]
    NoOperationDefined(String),

    /// Countdown requested for an operation that only runs on a schedule.
    #[error("Operation '{0}' runs on a cron schedule only")]
    PeriodicOnly(OperationType),

    /// Cron schedule requested for a foreground operation.
    #[error("Operation '{0}' cannot run on a cron schedule")]
    NotPeriodic(OperationType),

    #[error("Operation '{0}' is already active")]
    AlreadyActive(OperationType),

    /// The effect has started and cannot be cancelled.
    #[error("Operation '{0}' is executing")]
    Executing(OperationType),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}
