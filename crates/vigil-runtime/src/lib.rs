//! Runtime adapters for vigil.
//!
//! Everything that touches processes, files and the network lives here:
//! the log decoder and watcher, the process supervisor, the server state
//! aggregator, the player tracker with its HTTP and storage adapters, and
//! [`ServerEngine`] tying them together.
#![deny(unused_crate_dependencies)]

pub mod decoder;
pub mod emitter;
pub mod engine;
pub mod players;
pub mod process;
pub mod state;
pub mod watcher;

pub use decoder::{DecodeError, LogLineDecoder};
pub use emitter::BroadcastEmitter;
pub use engine::{EngineDeps, ServerEngine};
pub use players::{
    HttpPlayerDetails, InMemoryPlayerStore, JsonFilePlayerStore, PlayerSessionTracker,
};
pub use process::{FileLogSink, HostPlatform, LaunchPlan, ProcessSupervisor, SupervisorSignal};
pub use state::ServerStateAggregator;
pub use watcher::{LogStreamWatcher, WatchError, WatchState};
