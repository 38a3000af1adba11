//! Process control as seen by operation effects.

use std::time::Duration;

use async_trait::async_trait;

use super::ProcessError;

/// Stop or restart the supervised server.
#[async_trait]
pub trait ServerControlPort: Send + Sync {
    /// Stop the process. No-op if nothing is running.
    async fn stop_server(&self) -> Result<(), ProcessError>;

    /// Stop, start again and wait until the server reports ready.
    ///
    /// Fails with [`ProcessError::ReadyTimeout`] if ready is not seen
    /// within `timeout`.
    async fn restart_server(&self, timeout: Duration) -> Result<(), ProcessError>;
}
