//! Structured events decoded from single server log lines.

use serde::{Deserialize, Serialize};

use super::player::PlayerPatch;
use super::server_state::ServerStatePatch;

/// Fields of a `NetEndPoint ... approvedUserIndex ...` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetApproval {
    #[serde(rename = "steamID")]
    pub steam_id: String,
    pub steam_idx: Option<u32>,
    pub approved_user_index: u32,
    pub has_local_character: bool,
    pub should_create_character: Option<bool>,
    pub user_index: u32,
    pub is_admin: bool,
}

/// Fields of a `User '{Steam ...}' ... connected as ID ...` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterConnection {
    #[serde(rename = "steamID")]
    pub steam_id: String,
    pub steam_idx: u32,
    pub approved_user_index: u32,
    pub character_name: String,
    pub character_id: String,
    pub entity_id: String,
}

/// The closed set of events the decoder can produce.
///
/// Produced once per matching line, consumed synchronously and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LogEvent {
    ServerInfoParsed {
        time: String,
        version: String,
    },
    IdentityAssigned {
        #[serde(rename = "steamID")]
        steam_id: String,
    },
    AppIdParsed {
        #[serde(rename = "appID")]
        app_id: u32,
    },
    ConnectedToSteam,
    SetupComplete,
    SaveVersionParsed {
        loaded: String,
        current: String,
    },
    PlayerNetApproved(NetApproval),
    PlayerCharacterConnected(CharacterConnection),
    PlayerReconnected(CharacterConnection),
    PlayerDisconnected {
        approved_user_index: u32,
        reason: Option<String>,
    },
}

impl LogEvent {
    /// Stable snake_case name of the variant, used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ServerInfoParsed { .. } => "server_info_parsed",
            Self::IdentityAssigned { .. } => "identity_assigned",
            Self::AppIdParsed { .. } => "app_id_parsed",
            Self::ConnectedToSteam => "connected_to_steam",
            Self::SetupComplete => "setup_complete",
            Self::SaveVersionParsed { .. } => "save_version_parsed",
            Self::PlayerNetApproved(_) => "player_net_approved",
            Self::PlayerCharacterConnected(_) => "player_character_connected",
            Self::PlayerReconnected(_) => "player_reconnected",
            Self::PlayerDisconnected { .. } => "player_disconnected",
        }
    }

    /// Whether this event concerns a player session rather than the server.
    pub const fn is_player_event(&self) -> bool {
        matches!(
            self,
            Self::PlayerNetApproved(_)
                | Self::PlayerCharacterConnected(_)
                | Self::PlayerReconnected(_)
                | Self::PlayerDisconnected { .. }
        )
    }

    /// Key of the player session this event belongs to.
    pub const fn approved_user_index(&self) -> Option<u32> {
        match self {
            Self::PlayerNetApproved(a) => Some(a.approved_user_index),
            Self::PlayerCharacterConnected(c) | Self::PlayerReconnected(c) => {
                Some(c.approved_user_index)
            }
            Self::PlayerDisconnected {
                approved_user_index,
                ..
            } => Some(*approved_user_index),
            _ => None,
        }
    }

    /// Server-state fields carried by this event, if any.
    pub fn server_patch(&self) -> Option<ServerStatePatch> {
        let patch = match self {
            Self::ServerInfoParsed { time, version } => ServerStatePatch {
                time: Some(time.clone()),
                version: Some(version.clone()),
                ..Default::default()
            },
            Self::IdentityAssigned { steam_id } => ServerStatePatch {
                steam_id: Some(steam_id.clone()),
                ..Default::default()
            },
            Self::AppIdParsed { app_id } => ServerStatePatch {
                app_id: Some(*app_id),
                ..Default::default()
            },
            Self::ConnectedToSteam => ServerStatePatch {
                connected_to_steam: Some(true),
                ..Default::default()
            },
            Self::SetupComplete => ServerStatePatch {
                setup_complete: true,
                ..Default::default()
            },
            Self::SaveVersionParsed { loaded, current } => ServerStatePatch {
                loaded_save_game_version: Some(loaded.clone()),
                current_game_version: Some(current.clone()),
                ..Default::default()
            },
            _ => return None,
        };
        Some(patch)
    }

    /// Player-session fields carried by this event, if any.
    pub fn player_patch(&self) -> Option<PlayerPatch> {
        let patch = match self {
            Self::PlayerNetApproved(a) => PlayerPatch {
                user_index: Some(a.user_index),
                steam_idx: a.steam_idx,
                steam_id: Some(a.steam_id.clone()),
                has_local_character: Some(a.has_local_character),
                should_create_character: a.should_create_character,
                is_admin: Some(a.is_admin),
                ..Default::default()
            },
            Self::PlayerCharacterConnected(c) | Self::PlayerReconnected(c) => PlayerPatch {
                steam_idx: Some(c.steam_idx),
                steam_id: Some(c.steam_id.clone()),
                character_name: Some(c.character_name.clone()),
                character_id: Some(c.character_id.clone()),
                entity_id: Some(c.entity_id.clone()),
                ..Default::default()
            },
            Self::PlayerDisconnected { reason, .. } => PlayerPatch {
                disconnect_reason: reason.clone(),
                ..Default::default()
            },
            _ => return None,
        };
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> CharacterConnection {
        CharacterConnection {
            steam_id: "111".to_string(),
            steam_idx: 0,
            approved_user_index: 5,
            character_name: "Bob".to_string(),
            character_id: "1,2".to_string(),
            entity_id: "3".to_string(),
        }
    }

    #[test]
    fn test_server_events_have_no_player_patch() {
        assert!(LogEvent::SetupComplete.player_patch().is_none());
        assert!(LogEvent::SetupComplete.approved_user_index().is_none());
        assert!(LogEvent::SetupComplete.server_patch().unwrap().setup_complete);
    }

    #[test]
    fn test_player_events_have_no_server_patch() {
        let event = LogEvent::PlayerCharacterConnected(connection());
        assert!(event.server_patch().is_none());
        assert!(event.is_player_event());
        assert_eq!(event.approved_user_index(), Some(5));
    }

    #[test]
    fn test_character_patch_leaves_approval_fields_unset() {
        let patch = LogEvent::PlayerReconnected(connection())
            .player_patch()
            .unwrap();
        assert_eq!(patch.character_name.as_deref(), Some("Bob"));
        assert!(patch.has_local_character.is_none());
        assert!(patch.is_admin.is_none());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(LogEvent::PlayerDisconnected {
            approved_user_index: 4,
            reason: None,
        })
        .unwrap();
        assert_eq!(json["type"], "player_disconnected");
        assert_eq!(json["approvedUserIndex"], 4);

        let json = serde_json::to_value(LogEvent::AppIdParsed { app_id: 10 }).unwrap();
        assert_eq!(json["type"], "app_id_parsed");
        assert_eq!(json["appID"], 10);
    }
}
