//! Core domain types, events and port definitions for vigil.
//!
//! This crate contains no process, filesystem or network code. It defines
//! what the supervisor knows about the dedicated server (domain state,
//! player sessions, operations), the events it publishes, and the traits
//! (ports) that the runtime and operation crates implement or consume.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    CharacterConnection, LogEvent, NetApproval, OperationDefinition, OperationInfo,
    OperationStatus, OperationType, PlayerDetails, PlayerPatch, PlayerRecord, PlayerSession,
    ServerDomainState, ServerStatePatch,
};
pub use events::AppEvent;
pub use ports::{
    AnnouncerPort, AppEventEmitter, CoreError, NoopAnnouncer, NoopEmitter, NoopLogSink,
    PlayerApiError, PlayerDetailsPort, PlayerStorePort, ProcessError, ProcessLogSink, RconError,
    ServerControlPort, StoreError,
};
pub use settings::{
    LOG_FILE_PLACEHOLDER, OperationsConfig, PlayerApiConfig, RconConfig, ServerConfig,
    SettingsError, StorageConfig, VigilConfig, WatcherConfig, parse_timezone, validate_config,
    validate_cron,
};

#[cfg(test)]
use tokio as _;
