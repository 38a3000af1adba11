//! External player-details query.

use async_trait::async_trait;

use super::PlayerApiError;
use crate::domain::PlayerDetails;

/// Looks up player attributes by `approvedUserIndex`.
#[async_trait]
pub trait PlayerDetailsPort: Send + Sync {
    /// Fetch details for a session.
    ///
    /// Returns `Ok(None)` when the API does not know the index.
    async fn fetch(&self, approved_user_index: u32)
    -> Result<Option<PlayerDetails>, PlayerApiError>;
}
