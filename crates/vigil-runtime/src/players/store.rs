//! Durable player table implementations.
//!
//! - [`InMemoryPlayerStore`] for tests and runs without a players file
//! - [`JsonFilePlayerStore`] persisting the whole table as one JSON document

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use vigil_core::{PlayerRecord, PlayerSession, PlayerStorePort, StoreError};

/// Player records keyed by Steam id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlayerTable {
    players: BTreeMap<String, PlayerRecord>,
}

impl PlayerTable {
    fn upsert_session(&mut self, session: &PlayerSession, now: DateTime<Utc>) -> bool {
        let Some(ref steam_id) = session.steam_id else {
            return false;
        };
        match self.players.get_mut(steam_id) {
            Some(record) => record.update_from_session(session, now),
            None => {
                if let Some(record) = PlayerRecord::from_session(session, now) {
                    self.players.insert(steam_id.clone(), record);
                }
            }
        }
        true
    }

    fn mark_disconnected(
        &mut self,
        steam_id: Option<&str>,
        approved_user_index: u32,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let record = match steam_id {
            Some(id) => self.players.get_mut(id),
            None => self.players.values_mut().find(|r| {
                r.is_connected && r.last_approved_user_index == Some(approved_user_index)
            }),
        };
        let Some(record) = record else {
            return false;
        };
        record.is_connected = false;
        record.last_disconnect_reason = reason.map(str::to_string);
        record.last_seen = now;
        true
    }

    fn mark_all_disconnected(&mut self, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for record in self.players.values_mut().filter(|r| r.is_connected) {
            record.is_connected = false;
            record.last_seen = now;
            changed += 1;
        }
        changed
    }

    fn all(&self) -> Vec<PlayerRecord> {
        self.players.values().cloned().collect()
    }
}

/// Player store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    table: Mutex<PlayerTable>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStorePort for InMemoryPlayerStore {
    async fn upsert_session(
        &self,
        session: &PlayerSession,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.table.lock().await.upsert_session(session, now);
        Ok(())
    }

    async fn mark_disconnected(
        &self,
        steam_id: Option<&str>,
        approved_user_index: u32,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.table
            .lock()
            .await
            .mark_disconnected(steam_id, approved_user_index, reason, now);
        Ok(())
    }

    async fn mark_all_disconnected(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.table.lock().await.mark_all_disconnected(now))
    }

    async fn all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.table.lock().await.all())
    }
}

/// Player store backed by a JSON file.
///
/// The table is loaded once and rewritten after every change through a
/// temporary file and a rename.
#[derive(Debug)]
pub struct JsonFilePlayerStore {
    path: PathBuf,
    table: Mutex<PlayerTable>,
}

impl JsonFilePlayerStore {
    /// Load the table from `path`. A missing file is an empty table.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PlayerTable::default(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        debug!(path = %path.display(), players = table.players.len(), "Loaded player store");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    async fn persist(&self, table: &PlayerTable) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(table)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl PlayerStorePort for JsonFilePlayerStore {
    async fn upsert_session(
        &self,
        session: &PlayerSession,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        if table.upsert_session(session, now) {
            self.persist(&table).await?;
        }
        Ok(())
    }

    async fn mark_disconnected(
        &self,
        steam_id: Option<&str>,
        approved_user_index: u32,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        if table.mark_disconnected(steam_id, approved_user_index, reason, now) {
            self.persist(&table).await?;
        }
        Ok(())
    }

    async fn mark_all_disconnected(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut table = self.table.lock().await;
        let changed = table.mark_all_disconnected(now);
        if changed > 0 {
            self.persist(&table).await?;
        }
        Ok(changed)
    }

    async fn all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.table.lock().await.all())
    }
}
