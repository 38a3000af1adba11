//! In-game announcements sent over the server's command channel.

use async_trait::async_trait;

use super::RconError;

/// Sends operator announcements to players.
#[async_trait]
pub trait AnnouncerPort: Send + Sync {
    /// Broadcast a free-form message.
    async fn send_announce(&self, message: &str) -> Result<(), RconError>;

    /// Announce a pending restart. `0` minutes means "now".
    async fn send_restart_announce(&self, minutes_remaining: u64) -> Result<(), RconError> {
        let message = if minutes_remaining == 0 {
            "Server is restarting now".to_string()
        } else if minutes_remaining == 1 {
            "Server restart in 1 minute".to_string()
        } else {
            format!("Server restart in {minutes_remaining} minutes")
        };
        self.send_announce(&message).await
    }
}

/// Announcer that accepts and drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnouncer;

#[async_trait]
impl AnnouncerPort for NoopAnnouncer {
    async fn send_announce(&self, _message: &str) -> Result<(), RconError> {
        Ok(())
    }
}
