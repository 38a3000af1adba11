//! Player session tracking.
//!
//! The tracker owns the live session table keyed by `approvedUserIndex`.
//! Each player log event is merged field by field; sessions that are still
//! missing data are enriched once from the player-details API in the
//! background. The durable store receives a copy of every change.

mod api;
mod store;

pub use api::HttpPlayerDetails;
pub use store::{InMemoryPlayerStore, JsonFilePlayerStore};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vigil_core::{
    AppEvent, AppEventEmitter, LogEvent, PlayerDetailsPort, PlayerRecord, PlayerSession,
    PlayerStorePort, StoreError,
};

struct TrackerInner {
    live: Mutex<HashMap<u32, PlayerSession>>,
    in_flight: Mutex<HashSet<u32>>,
    enrichments: Mutex<Vec<JoinHandle<()>>>,
    details: Option<Arc<dyn PlayerDetailsPort>>,
    store: Arc<dyn PlayerStorePort>,
    emitter: Arc<dyn AppEventEmitter>,
}

/// Authoritative table of connected players.
#[derive(Clone)]
pub struct PlayerSessionTracker {
    inner: Arc<TrackerInner>,
}

impl PlayerSessionTracker {
    /// Create a tracker. Enrichment is disabled when `details` is `None`.
    pub fn new(
        details: Option<Arc<dyn PlayerDetailsPort>>,
        store: Arc<dyn PlayerStorePort>,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                live: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                enrichments: Mutex::new(Vec::new()),
                details,
                store,
                emitter,
            }),
        }
    }

    /// Apply one player log event. Non-player events are ignored.
    pub async fn handle(&self, event: &LogEvent) {
        let (Some(key), Some(patch)) = (event.approved_user_index(), event.player_patch()) else {
            return;
        };

        if let LogEvent::PlayerDisconnected { reason, .. } = event {
            self.disconnect(key, reason.as_deref()).await;
            return;
        }

        let now = Utc::now();
        let session = {
            let mut live = self.inner.live.lock().await;
            let session = live.entry(key).or_insert_with(|| {
                debug!(approved_user_index = key, "New player session");
                PlayerSession {
                    connected_at: Some(now),
                    ..PlayerSession::new(key)
                }
            });
            session.apply(&patch);
            session.clone()
        };

        if let Err(e) = self.inner.store.upsert_session(&session, now).await {
            warn!(approved_user_index = key, error = %e, "Failed to persist player session");
        }

        if matches!(
            event,
            LogEvent::PlayerCharacterConnected(_) | LogEvent::PlayerReconnected(_)
        ) {
            info!(
                approved_user_index = key,
                character = ?session.character_name,
                "Player connected"
            );
            self.inner.emitter.emit(AppEvent::player_connected(&session));
        }

        if !session.is_initialized_from_api {
            self.spawn_enrichment(key).await;
        }
    }

    async fn disconnect(&self, key: u32, reason: Option<&str>) {
        let removed = self.inner.live.lock().await.remove(&key);
        let steam_id = removed.as_ref().and_then(|s| s.steam_id.clone());
        let user_index = removed.as_ref().and_then(|s| s.user_index);

        if removed.is_none() {
            debug!(approved_user_index = key, "Disconnect for unknown session");
        }
        info!(approved_user_index = key, ?reason, "Player disconnected");

        if let Err(e) = self
            .inner
            .store
            .mark_disconnected(steam_id.as_deref(), key, reason, Utc::now())
            .await
        {
            warn!(approved_user_index = key, error = %e, "Failed to persist disconnect");
        }

        self.inner
            .emitter
            .emit(AppEvent::player_disconnected(key, user_index));
    }

    async fn spawn_enrichment(&self, key: u32) {
        let Some(details) = self.inner.details.clone() else {
            return;
        };
        if !self.inner.in_flight.lock().await.insert(key) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = details.fetch(key).await;
            inner.in_flight.lock().await.remove(&key);

            let found = match result {
                Ok(Some(found)) => found,
                Ok(None) => {
                    debug!(approved_user_index = key, "Player details not found");
                    return;
                }
                Err(e) => {
                    warn!(approved_user_index = key, error = %e, "Player enrichment failed");
                    return;
                }
            };

            let session = {
                let mut live = inner.live.lock().await;
                let Some(session) = live.get_mut(&key) else {
                    debug!(approved_user_index = key, "Dropping details for departed session");
                    return;
                };
                session.fill_from_details(&found);
                session.is_initialized_from_api = true;
                session.clone()
            };

            if let Err(e) = inner.store.upsert_session(&session, Utc::now()).await {
                warn!(approved_user_index = key, error = %e, "Failed to persist enriched session");
            }
        });

        let mut tasks = self.inner.enrichments.lock().await;
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Wait for every enrichment started so far.
    pub async fn settle(&self) {
        let tasks = std::mem::take(&mut *self.inner.enrichments.lock().await);
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Clear the live table and mark every stored player disconnected.
    ///
    /// Called when the server process starts or stops.
    pub async fn reconcile(&self) {
        self.inner.live.lock().await.clear();
        self.inner.in_flight.lock().await.clear();
        match self.inner.store.mark_all_disconnected(Utc::now()).await {
            Ok(0) => {}
            Ok(count) => info!(count, "Marked stale players disconnected"),
            Err(e) => warn!(error = %e, "Failed to reconcile player store"),
        }
    }

    /// Live sessions ordered by key.
    pub async fn connected_players(&self) -> Vec<PlayerSession> {
        let mut players: Vec<PlayerSession> =
            self.inner.live.lock().await.values().cloned().collect();
        players.sort_by_key(|p| p.approved_user_index);
        players
    }

    pub async fn session(&self, approved_user_index: u32) -> Option<PlayerSession> {
        self.inner
            .live
            .lock()
            .await
            .get(&approved_user_index)
            .cloned()
    }

    /// Every stored player that ever had a character.
    pub async fn all_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self
            .inner
            .store
            .all()
            .await?
            .into_iter()
            .filter(|p| p.had_local_character)
            .collect())
    }
}
