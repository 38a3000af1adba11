//! Canonical outbound event union.
//!
//! Every state change the supervisor publishes goes through [`AppEvent`].
//! Transports (stdout JSON lines, websockets, bots) subscribe to the emitter
//! and forward events verbatim.
//!
//! # Wire Format
//!
//! Events are serialized with a snake_case `type` tag and camelCase fields:
//!
//! ```json
//! { "type": "player_disconnected", "approvedUserIndex": 5, "userIndex": 2 }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{OperationInfo, PlayerSession, ServerDomainState};

/// Outbound events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AppEvent {
    // ========== Server Events ==========
    /// Server state changed.
    ServerInfo { state: ServerDomainState },

    /// Server finished setup. Emitted once per process lifetime.
    Ready { state: ServerDomainState },

    /// The supervised process was spawned.
    ServerStarted { pid: Option<u32> },

    /// The supervised process exited.
    ServerStopped { exit_code: Option<i32> },

    /// The supervisor failed to spawn or lost track of the process.
    ServerError { message: String },

    // ========== Player Events ==========
    /// A character entered the world.
    PlayerConnected { player: PlayerSession },

    /// A session ended.
    PlayerDisconnected {
        approved_user_index: u32,
        user_index: Option<u32>,
    },

    // ========== Operation Events ==========
    OperationScheduled { operation: OperationInfo },
    OperationProgress { operation: OperationInfo },
    OperationFinished { operation: OperationInfo },

    /// The operation effect failed. Always followed by `operation_finished`.
    OperationError {
        operation: OperationInfo,
        error: String,
    },
}

impl AppEvent {
    pub fn server_info(state: &ServerDomainState) -> Self {
        Self::ServerInfo {
            state: state.clone(),
        }
    }

    pub fn ready(state: &ServerDomainState) -> Self {
        Self::Ready {
            state: state.clone(),
        }
    }

    pub const fn server_started(pid: Option<u32>) -> Self {
        Self::ServerStarted { pid }
    }

    pub const fn server_stopped(exit_code: Option<i32>) -> Self {
        Self::ServerStopped { exit_code }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    pub fn player_connected(player: &PlayerSession) -> Self {
        Self::PlayerConnected {
            player: player.clone(),
        }
    }

    pub const fn player_disconnected(approved_user_index: u32, user_index: Option<u32>) -> Self {
        Self::PlayerDisconnected {
            approved_user_index,
            user_index,
        }
    }

    pub fn operation_scheduled(operation: &OperationInfo) -> Self {
        Self::OperationScheduled {
            operation: operation.clone(),
        }
    }

    pub fn operation_progress(operation: &OperationInfo) -> Self {
        Self::OperationProgress {
            operation: operation.clone(),
        }
    }

    pub fn operation_finished(operation: &OperationInfo) -> Self {
        Self::OperationFinished {
            operation: operation.clone(),
        }
    }

    pub fn operation_error(operation: &OperationInfo, error: impl Into<String>) -> Self {
        Self::OperationError {
            operation: operation.clone(),
            error: error.into(),
        }
    }

    /// Get the event name for wire protocols.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ServerInfo { .. } => "server:info",
            Self::Ready { .. } => "server:ready",
            Self::ServerStarted { .. } => "server:started",
            Self::ServerStopped { .. } => "server:stopped",
            Self::ServerError { .. } => "server:error",
            Self::PlayerConnected { .. } => "player:connected",
            Self::PlayerDisconnected { .. } => "player:disconnected",
            Self::OperationScheduled { .. } => "operation:scheduled",
            Self::OperationProgress { .. } => "operation:progress",
            Self::OperationFinished { .. } => "operation:finished",
            Self::OperationError { .. } => "operation:error",
        }
    }
}
