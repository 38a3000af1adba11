//! Durable player table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StoreError;
use crate::domain::{PlayerRecord, PlayerSession};

/// Secondary, eventually-consistent copy of the player table keyed by
/// Steam id.
#[async_trait]
pub trait PlayerStorePort: Send + Sync {
    /// Insert or update the record for the session's Steam id and mark it
    /// connected. Sessions without a Steam id are ignored.
    async fn upsert_session(
        &self,
        session: &PlayerSession,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Mark the record owning `approved_user_index` as disconnected.
    async fn mark_disconnected(
        &self,
        steam_id: Option<&str>,
        approved_user_index: u32,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Mark every connected record as disconnected. Returns how many changed.
    async fn mark_all_disconnected(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Every stored record.
    async fn all(&self) -> Result<Vec<PlayerRecord>, StoreError>;
}
