//! # vigil
//!
//! Facade over the workspace crates. Applications usually depend on the
//! crates directly:
//!
//! - `vigil_core` - domain types, events, ports and configuration
//! - `vigil_runtime` - log tailing, decoding, process supervision, player
//!   tracking and the [`ServerEngine`](vigil_runtime::ServerEngine)
//! - `vigil_ops` - scheduled operations and RCON announcements
//!
//! The package also hosts the cross-crate integration tests.

pub use vigil_core;
pub use vigil_ops;
pub use vigil_runtime;

pub use vigil_core::{AppEvent, LogEvent, OperationInfo, OperationType, VigilConfig};
pub use vigil_ops::{OperationManager, RconClient};
pub use vigil_runtime::{BroadcastEmitter, LogLineDecoder, ServerEngine};
