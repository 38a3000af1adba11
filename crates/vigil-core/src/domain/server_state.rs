//! Server-wide state derived from the dedicated server log.

use serde::{Deserialize, Serialize};

/// Snapshot of everything the log has told us about the running server.
///
/// Created with all-empty defaults when the process starts, updated field by
/// field as log events arrive and reset to defaults when the process stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDomainState {
    /// Timestamp reported next to the server version line.
    pub time: Option<String>,
    /// Server build version.
    pub version: Option<String>,
    /// Steam identity assigned to the server.
    #[serde(rename = "steamID")]
    pub steam_id: Option<String>,
    /// Steam application id.
    #[serde(rename = "appID")]
    pub app_id: Option<u32>,
    /// Whether the server reported a connection to the Steam backend.
    pub connected_to_steam: bool,
    /// Whether the server finished setup. Only ever goes false -> true
    /// within one process lifetime.
    pub server_setup_complete: bool,
    /// Game version the loaded save was written with.
    pub loaded_save_game_version: Option<String>,
    /// Game version of the running server.
    pub current_game_version: Option<String>,
    /// Whether a save game has been loaded.
    pub is_save_loaded: bool,
    /// Whether the save version matches the running version (unknown until
    /// a save is loaded).
    pub is_save_version_identical: Option<bool>,
}

/// Partial update to [`ServerDomainState`].
///
/// Every field is optional; `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatePatch {
    pub time: Option<String>,
    pub version: Option<String>,
    pub steam_id: Option<String>,
    pub app_id: Option<u32>,
    pub connected_to_steam: Option<bool>,
    /// Setup completion can only be raised, never cleared, by a patch.
    pub setup_complete: bool,
    pub loaded_save_game_version: Option<String>,
    pub current_game_version: Option<String>,
}

impl ServerDomainState {
    /// Merge a patch into the state.
    ///
    /// Returns `true` if any field changed.
    pub fn merge(&mut self, patch: &ServerStatePatch) -> bool {
        let before = self.clone();

        if let Some(ref time) = patch.time {
            self.time = Some(time.clone());
        }
        if let Some(ref version) = patch.version {
            self.version = Some(version.clone());
        }
        if let Some(ref steam_id) = patch.steam_id {
            self.steam_id = Some(steam_id.clone());
        }
        if let Some(app_id) = patch.app_id {
            self.app_id = Some(app_id);
        }
        if let Some(connected) = patch.connected_to_steam {
            self.connected_to_steam = connected;
        }
        if patch.setup_complete {
            self.server_setup_complete = true;
        }
        if let Some(ref loaded) = patch.loaded_save_game_version {
            self.loaded_save_game_version = Some(loaded.clone());
        }
        if let Some(ref current) = patch.current_game_version {
            self.current_game_version = Some(current.clone());
        }

        if patch.loaded_save_game_version.is_some() || patch.current_game_version.is_some() {
            self.is_save_loaded = self.loaded_save_game_version.is_some();
            self.is_save_version_identical = match (
                &self.loaded_save_game_version,
                &self.current_game_version,
            ) {
                (Some(loaded), Some(current)) => Some(loaded == current),
                _ => None,
            };
        }

        *self != before
    }

    /// Reset every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_empty() {
        let state = ServerDomainState::default();
        assert!(state.version.is_none());
        assert!(!state.server_setup_complete);
        assert!(state.is_save_version_identical.is_none());
    }

    #[test]
    fn test_merge_only_touches_present_fields() {
        let mut state = ServerDomainState::default();
        state.merge(&ServerStatePatch {
            version: Some("1.2.3".to_string()),
            ..Default::default()
        });
        state.merge(&ServerStatePatch {
            app_id: Some(2_089_300),
            ..Default::default()
        });

        assert_eq!(state.version.as_deref(), Some("1.2.3"));
        assert_eq!(state.app_id, Some(2_089_300));
    }

    #[test]
    fn test_setup_complete_never_reverts_via_merge() {
        let mut state = ServerDomainState::default();
        state.merge(&ServerStatePatch {
            setup_complete: true,
            ..Default::default()
        });
        state.merge(&ServerStatePatch::default());
        assert!(state.server_setup_complete);

        state.reset();
        assert!(!state.server_setup_complete);
    }

    #[test]
    fn test_save_versions_compare() {
        let mut state = ServerDomainState::default();
        let changed = state.merge(&ServerStatePatch {
            loaded_save_game_version: Some("0.9.1".to_string()),
            current_game_version: Some("0.9.2".to_string()),
            ..Default::default()
        });

        assert!(changed);
        assert!(state.is_save_loaded);
        assert_eq!(state.is_save_version_identical, Some(false));
    }

    #[test]
    fn test_merge_reports_no_change() {
        let mut state = ServerDomainState::default();
        let patch = ServerStatePatch {
            connected_to_steam: Some(true),
            ..Default::default()
        };
        assert!(state.merge(&patch));
        assert!(!state.merge(&patch));
    }

    #[test]
    fn test_serialization_field_names() {
        let state = ServerDomainState {
            steam_id: Some("9001".to_string()),
            app_id: Some(7),
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"steamID\":\"9001\""));
        assert!(json.contains("\"appID\":7"));
        assert!(json.contains("\"serverSetupComplete\":false"));
    }
}
