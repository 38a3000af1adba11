//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the supervisor core expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No process handles, sockets or file handles in any signature
//! - Fire-and-forget ports (`AppEventEmitter`, `ProcessLogSink`) never fail
//! - Fallible ports return the port's own error enum

pub mod announcer;
pub mod event_emitter;
pub mod player_details;
pub mod player_store;
pub mod process_log_sink;
pub mod server_control;

use thiserror::Error;

pub use announcer::{AnnouncerPort, NoopAnnouncer};
pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use player_details::PlayerDetailsPort;
pub use player_store::PlayerStorePort;
pub use process_log_sink::{NoopLogSink, ProcessLogSink};
pub use server_control::ServerControlPort;

/// Errors from supervising the external server process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The host platform has no launch strategy.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A supervised process is already running.
    #[error("Server process is already running (pid {0:?})")]
    AlreadyRunning(Option<u32>),

    /// No supervised process is running.
    #[error("Server process is not running")]
    NotRunning,

    /// Failed to spawn the process.
    #[error("Failed to spawn server process: {0}")]
    SpawnFailed(String),

    /// Failed to stop the process.
    #[error("Failed to stop server process: {0}")]
    StopFailed(String),

    /// The server log could not be followed.
    #[error("Server log unavailable: {0}")]
    LogUnavailable(String),

    /// The server did not report ready in time.
    #[error("Server did not become ready within {0}s")]
    ReadyTimeout(u64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors from the external player-details API.
#[derive(Debug, Error)]
pub enum PlayerApiError {
    /// The request could not be sent or timed out.
    #[error("Player API request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status other than 404.
    #[error("Player API returned status {0}")]
    Status(u16),

    /// The response body was not valid player JSON.
    #[error("Player API response could not be decoded: {0}")]
    Decode(String),
}

/// Errors from the durable player store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Player store I/O error: {0}")]
    Io(String),

    #[error("Player store serialization error: {0}")]
    Serialization(String),
}

/// Errors from the RCON command channel.
#[derive(Debug, Error)]
pub enum RconError {
    /// RCON is disabled in configuration.
    #[error("RCON is disabled")]
    Disabled,

    /// TCP connection could not be established.
    #[error("RCON connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// The server rejected the password.
    #[error("RCON authentication rejected")]
    AuthFailed,

    /// Socket read or write failed.
    #[error("RCON I/O error: {0}")]
    Io(String),

    /// The peer sent a malformed packet.
    #[error("RCON protocol error: {0}")]
    Protocol(String),
}

/// Core error type for semantic domain errors.
///
/// Adapters map this to their own surfaces (CLI exit codes, HTTP status).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    #[error(transparent)]
    PlayerApi(#[from] PlayerApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rcon(#[from] RconError),

    /// Internal error (unexpected condition).
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let err: CoreError = ProcessError::UnsupportedPlatform("macos".to_string()).into();
        assert_eq!(err.to_string(), "Unsupported platform: macos");
    }

    #[test]
    fn test_rcon_connect_message() {
        let err = RconError::Connect {
            addr: "127.0.0.1:27015".to_string(),
            reason: "refused".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:27015"));
    }
}
