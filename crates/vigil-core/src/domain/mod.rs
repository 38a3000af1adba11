//! Domain types for the supervised server.
//!
//! - `server_state` - the server-wide projection built from the log
//! - `log_event` - the closed set of events the log decoder produces
//! - `player` - live player sessions, API details and durable records
//! - `operation` - administrative operations and their lifecycle

mod log_event;
mod operation;
mod player;
mod server_state;

pub use log_event::{CharacterConnection, LogEvent, NetApproval};
pub use operation::{OperationDefinition, OperationInfo, OperationStatus, OperationType};
pub use player::{PlayerDetails, PlayerPatch, PlayerRecord, PlayerSession};
pub use server_state::{ServerDomainState, ServerStatePatch};
