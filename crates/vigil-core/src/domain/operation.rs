//! Administrative operations (restart, stop, periodic restart).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    Restart,
    Stop,
    PeriodicRestart,
}

/// Static properties of an operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDefinition {
    /// Background operations are exempt from foreground exclusivity.
    pub is_background: bool,
    pub is_periodic: bool,
    pub is_restart: bool,
    /// Foreground operation a periodic trigger starts.
    pub target: Option<OperationType>,
}

impl OperationType {
    /// Every registered operation type.
    pub const ALL: [Self; 3] = [Self::Restart, Self::Stop, Self::PeriodicRestart];

    /// Wire name of the operation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::PeriodicRestart => "periodic-restart",
        }
    }

    pub const fn definition(self) -> OperationDefinition {
        match self {
            Self::Restart => OperationDefinition {
                is_background: false,
                is_periodic: false,
                is_restart: true,
                target: None,
            },
            Self::Stop => OperationDefinition {
                is_background: false,
                is_periodic: false,
                is_restart: false,
                target: None,
            },
            Self::PeriodicRestart => OperationDefinition {
                is_background: true,
                is_periodic: true,
                is_restart: true,
                target: Some(Self::Restart),
            },
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Lifecycle status of an operation instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Idle,
    Scheduled,
    Running,
    Cancelled,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Scheduled or running.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Scheduled | Self::Running)
    }
}

/// Observable state of one operation instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub is_background: bool,
    pub is_periodic: bool,
    pub is_restart: bool,
    pub status: OperationStatus,
    pub remaining_time_ms: u64,
    pub total_delay_ms: u64,
    pub execution_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub scheduled_by: Option<String>,
    /// Upper bound for the effect, in milliseconds.
    pub timeout_ms: u64,
}

impl OperationInfo {
    /// Idle info for an operation type.
    pub const fn new(operation_type: OperationType, timeout_ms: u64) -> Self {
        let def = operation_type.definition();
        Self {
            operation_type,
            is_background: def.is_background,
            is_periodic: def.is_periodic,
            is_restart: def.is_restart,
            status: OperationStatus::Idle,
            remaining_time_ms: 0,
            total_delay_ms: 0,
            execution_time: None,
            cron_expression: None,
            timezone: None,
            scheduled_by: None,
            timeout_ms,
        }
    }

    /// Return to `Idle`, keeping only type, background, restart and timeout.
    pub fn reset(&mut self) {
        *self = Self::new(self.operation_type, self.timeout_ms);
    }

    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whole minutes left on the countdown, rounded up.
    pub const fn remaining_minutes(&self) -> u64 {
        self.remaining_time_ms.div_ceil(60_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for t in OperationType::ALL {
            assert_eq!(t.as_str().parse::<OperationType>().unwrap(), t);
        }
        assert!("reboot".parse::<OperationType>().is_err());
    }

    #[test]
    fn test_periodic_restart_targets_restart() {
        let def = OperationType::PeriodicRestart.definition();
        assert!(def.is_background);
        assert_eq!(def.target, Some(OperationType::Restart));
        assert!(!OperationType::Stop.definition().is_restart);
    }

    #[test]
    fn test_reset_preserves_identity() {
        let mut info = OperationInfo::new(OperationType::Restart, 600_000);
        info.status = OperationStatus::Cancelled;
        info.remaining_time_ms = 120_000;
        info.scheduled_by = Some("admin".to_string());
        info.execution_time = Some(Utc::now());

        info.reset();

        assert_eq!(info.status, OperationStatus::Idle);
        assert_eq!(info.operation_type, OperationType::Restart);
        assert!(info.is_restart);
        assert_eq!(info.timeout_ms, 600_000);
        assert_eq!(info.remaining_time_ms, 0);
        assert!(info.scheduled_by.is_none());
        assert!(info.execution_time.is_none());
    }

    #[test]
    fn test_serialized_type_name() {
        let info = OperationInfo::new(OperationType::PeriodicRestart, 0);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "periodic-restart");
        assert_eq!(json["status"], "idle");
        assert_eq!(json["isBackground"], true);
    }

    #[test]
    fn test_remaining_minutes_rounds_up() {
        let mut info = OperationInfo::new(OperationType::Stop, 0);
        info.remaining_time_ms = 60_001;
        assert_eq!(info.remaining_minutes(), 2);
        info.remaining_time_ms = 0;
        assert_eq!(info.remaining_minutes(), 0);
    }
}
