//! Player session types.
//!
//! A [`PlayerSession`] is the live, per-connection view keyed by the
//! server-assigned `approvedUserIndex`. A [`PlayerRecord`] is the durable,
//! per-player copy keyed by Steam id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live state of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSession {
    /// Stable key for this connection attempt.
    pub approved_user_index: u32,
    pub user_index: Option<u32>,
    pub steam_idx: Option<u32>,
    #[serde(rename = "steamID")]
    pub steam_id: Option<String>,
    pub has_local_character: Option<bool>,
    pub should_create_character: Option<bool>,
    pub is_admin: Option<bool>,
    pub character_name: Option<String>,
    /// Network id reported when the character connected (e.g. `"1,2"`).
    pub character_id: Option<String>,
    pub entity_id: Option<String>,
    pub disconnect_reason: Option<String>,
    /// Set once the external player-details API has been merged in.
    pub is_initialized_from_api: bool,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Partial update to a [`PlayerSession`], built from one log event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerPatch {
    pub user_index: Option<u32>,
    pub steam_idx: Option<u32>,
    pub steam_id: Option<String>,
    pub has_local_character: Option<bool>,
    pub should_create_character: Option<bool>,
    pub is_admin: Option<bool>,
    pub character_name: Option<String>,
    pub character_id: Option<String>,
    pub entity_id: Option<String>,
    pub disconnect_reason: Option<String>,
}

/// Player attributes returned by the external player-details API.
///
/// Every field is optional: the API only reports what it knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerDetails {
    pub user_index: Option<u32>,
    pub steam_idx: Option<u32>,
    #[serde(rename = "steamID")]
    pub steam_id: Option<String>,
    pub has_local_character: Option<bool>,
    pub is_admin: Option<bool>,
    pub character_name: Option<String>,
    pub entity_id: Option<String>,
}

impl PlayerSession {
    /// Create an empty session for a newly seen key.
    pub const fn new(approved_user_index: u32) -> Self {
        Self {
            approved_user_index,
            user_index: None,
            steam_idx: None,
            steam_id: None,
            has_local_character: None,
            should_create_character: None,
            is_admin: None,
            character_name: None,
            character_id: None,
            entity_id: None,
            disconnect_reason: None,
            is_initialized_from_api: false,
            connected_at: None,
        }
    }

    /// Apply a patch: every field present in the patch overwrites the
    /// current value, every absent field is preserved.
    pub fn apply(&mut self, patch: &PlayerPatch) {
        if let Some(v) = patch.user_index {
            self.user_index = Some(v);
        }
        if let Some(v) = patch.steam_idx {
            self.steam_idx = Some(v);
        }
        if let Some(ref v) = patch.steam_id {
            self.steam_id = Some(v.clone());
        }
        if let Some(v) = patch.has_local_character {
            self.has_local_character = Some(v);
        }
        if let Some(v) = patch.should_create_character {
            self.should_create_character = Some(v);
        }
        if let Some(v) = patch.is_admin {
            self.is_admin = Some(v);
        }
        if let Some(ref v) = patch.character_name {
            self.character_name = Some(v.clone());
        }
        if let Some(ref v) = patch.character_id {
            self.character_id = Some(v.clone());
        }
        if let Some(ref v) = patch.entity_id {
            self.entity_id = Some(v.clone());
        }
        if let Some(ref v) = patch.disconnect_reason {
            self.disconnect_reason = Some(v.clone());
        }
    }

    /// Merge API details without overwriting anything the log already set.
    ///
    /// Log events are authoritative and may be newer than the API response,
    /// so only fields that are still unset are filled.
    pub fn fill_from_details(&mut self, details: &PlayerDetails) {
        if self.user_index.is_none() {
            self.user_index = details.user_index;
        }
        if self.steam_idx.is_none() {
            self.steam_idx = details.steam_idx;
        }
        if self.steam_id.is_none() {
            self.steam_id.clone_from(&details.steam_id);
        }
        if self.has_local_character.is_none() {
            self.has_local_character = details.has_local_character;
        }
        if self.is_admin.is_none() {
            self.is_admin = details.is_admin;
        }
        if self.character_name.is_none() {
            self.character_name.clone_from(&details.character_name);
        }
        if self.entity_id.is_none() {
            self.entity_id.clone_from(&details.entity_id);
        }
    }

    /// Whether this session has a character in the world.
    pub fn has_character(&self) -> bool {
        self.has_local_character == Some(true) || self.character_name.is_some()
    }
}

/// Durable per-player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    #[serde(rename = "steamID")]
    pub steam_id: String,
    pub character_name: Option<String>,
    pub entity_id: Option<String>,
    pub is_admin: bool,
    /// Sticky: once a player had a character it stays listed.
    pub had_local_character: bool,
    pub is_connected: bool,
    pub last_approved_user_index: Option<u32>,
    pub last_disconnect_reason: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl PlayerRecord {
    /// Build a fresh record from a session. Returns `None` if the session
    /// has no Steam id yet.
    pub fn from_session(session: &PlayerSession, now: DateTime<Utc>) -> Option<Self> {
        let steam_id = session.steam_id.clone()?;
        Some(Self {
            steam_id,
            character_name: session.character_name.clone(),
            entity_id: session.entity_id.clone(),
            is_admin: session.is_admin.unwrap_or(false),
            had_local_character: session.has_character(),
            is_connected: true,
            last_approved_user_index: Some(session.approved_user_index),
            last_disconnect_reason: None,
            last_seen: now,
        })
    }

    /// Fold a newer session into an existing record.
    pub fn update_from_session(&mut self, session: &PlayerSession, now: DateTime<Utc>) {
        if session.character_name.is_some() {
            self.character_name.clone_from(&session.character_name);
        }
        if session.entity_id.is_some() {
            self.entity_id.clone_from(&session.entity_id);
        }
        if let Some(admin) = session.is_admin {
            self.is_admin = admin;
        }
        self.had_local_character |= session.has_character();
        self.is_connected = true;
        self.last_approved_user_index = Some(session.approved_user_index);
        self.last_seen = now;
    }
}
