//! Ordered rule table for the server log format (version 1).
//!
//! Rules are tried top to bottom and the first match wins. The reconnect
//! rule must stay ahead of the plain character-connect rule because its
//! lines also match the latter.

use regex::{Captures, Regex};
use vigil_core::{CharacterConnection, LogEvent, NetApproval};

use super::DecodeError;

type Build = fn(&Captures<'_>) -> Result<LogEvent, DecodeError>;

pub(super) struct Rule {
    pub name: &'static str,
    pub pattern: Regex,
    pub build: Build,
}

const CHARACTER_CONNECT: &str = r"User '\{Steam (?P<steam_id>\d+)\}' '(?P<steam_idx>[^']*)',\s*approvedUserIndex:\s*(?P<approved>[^,\s]+),\s*Character:\s*'(?P<name>.*)' connected as ID '(?P<id>[^']*)',\s*Entity '(?P<entity>[^']*)'";

pub(super) fn build_rules() -> Result<Vec<Rule>, DecodeError> {
    let table: [(&'static str, String, Build); 10] = [
        (
            "server_info_parsed",
            r"\[(?P<time>[^\]]+)\]\s*Server version:\s*(?P<version>\S+)".to_string(),
            server_info,
        ),
        (
            "identity_assigned",
            r"Server identity assigned:\s*\{Steam (?P<steam_id>\d+)\}".to_string(),
            identity,
        ),
        (
            "app_id_parsed",
            r"Steam AppId:\s*(?P<app_id>\S+)".to_string(),
            app_id,
        ),
        (
            "connected_to_steam",
            r"Connected to Steam servers".to_string(),
            connected_to_steam,
        ),
        (
            "setup_complete",
            r"Server setup complete".to_string(),
            setup_complete,
        ),
        (
            "save_version_parsed",
            r"Save game version:\s*(?P<loaded>[^,\s]+),\s*current game version:\s*(?P<current>\S+)"
                .to_string(),
            save_version,
        ),
        (
            "player_net_approved",
            concat!(
                r"NetEndPoint '\{Steam (?P<steam_id>\d+)\}'(?:\s*\[?'(?P<steam_idx>\d*)'\]?)?",
                r".*?approvedUserIndex:\s*(?P<approved>[^,\s]+),?",
                r"\s+HasLocalCharacter:\s*(?P<has_local>[^,\s]+),?",
                r"(?:\s+ShouldCreateCharacter:\s*(?P<should_create>[^,\s]+),?)?",
                r".*?\bUserIndex:\s*(?P<user_index>[^,\s]+)",
                r".*?IsAdmin:\s*(?P<is_admin>[^,\s]+)",
            )
            .to_string(),
            net_approved,
        ),
        (
            "player_reconnected",
            format!(r"{CHARACTER_CONNECT}\s*\(reconnect\)"),
            reconnected,
        ),
        (
            "player_character_connected",
            CHARACTER_CONNECT.to_string(),
            character_connected,
        ),
        (
            "player_disconnected",
            r"User approvedUserIndex:\s*(?P<approved>[^,\s]+) disconnected(?:,\s*reason:\s*(?P<reason>.*))?"
                .to_string(),
            disconnected,
        ),
    ];

    table
        .into_iter()
        .map(|(name, pattern, build)| {
            let pattern = Regex::new(&pattern).map_err(|e| DecodeError::Pattern {
                rule: name,
                reason: e.to_string(),
            })?;
            Ok(Rule {
                name,
                pattern,
                build,
            })
        })
        .collect()
}

// ============================================================================
// Coercion
// ============================================================================

fn text(caps: &Captures<'_>, field: &'static str) -> Result<String, DecodeError> {
    caps.name(field)
        .map(|m| m.as_str().trim().to_string())
        .ok_or(DecodeError::MissingField(field))
}

fn int(caps: &Captures<'_>, field: &'static str) -> Result<u32, DecodeError> {
    let raw = text(caps, field)?;
    raw.parse().map_err(|_| DecodeError::Coercion { field, value: raw })
}

fn opt_int(caps: &Captures<'_>, field: &'static str) -> Result<Option<u32>, DecodeError> {
    match caps.name(field).map(|m| m.as_str().trim()) {
        None | Some("") => Ok(None),
        Some(_) => int(caps, field).map(Some),
    }
}

/// `"True"`/`"False"` in any casing.
fn boolean(caps: &Captures<'_>, field: &'static str) -> Result<bool, DecodeError> {
    let raw = text(caps, field)?;
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(DecodeError::Coercion { field, value: raw })
    }
}

fn opt_boolean(caps: &Captures<'_>, field: &'static str) -> Result<Option<bool>, DecodeError> {
    if caps.name(field).is_some() {
        boolean(caps, field).map(Some)
    } else {
        Ok(None)
    }
}

// ============================================================================
// Builders
// ============================================================================

fn server_info(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::ServerInfoParsed {
        time: text(caps, "time")?,
        version: text(caps, "version")?,
    })
}

fn identity(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::IdentityAssigned {
        steam_id: text(caps, "steam_id")?,
    })
}

fn app_id(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::AppIdParsed {
        app_id: int(caps, "app_id")?,
    })
}

const fn connected_to_steam(_: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::ConnectedToSteam)
}

const fn setup_complete(_: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::SetupComplete)
}

fn save_version(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::SaveVersionParsed {
        loaded: text(caps, "loaded")?,
        current: text(caps, "current")?,
    })
}

fn net_approved(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    Ok(LogEvent::PlayerNetApproved(NetApproval {
        steam_id: text(caps, "steam_id")?,
        steam_idx: opt_int(caps, "steam_idx")?,
        approved_user_index: int(caps, "approved")?,
        has_local_character: boolean(caps, "has_local")?,
        should_create_character: opt_boolean(caps, "should_create")?,
        user_index: int(caps, "user_index")?,
        is_admin: boolean(caps, "is_admin")?,
    }))
}

fn character(caps: &Captures<'_>) -> Result<CharacterConnection, DecodeError> {
    Ok(CharacterConnection {
        steam_id: text(caps, "steam_id")?,
        steam_idx: int(caps, "steam_idx")?,
        approved_user_index: int(caps, "approved")?,
        character_name: text(caps, "name")?,
        character_id: text(caps, "id")?,
        entity_id: text(caps, "entity")?,
    })
}

fn reconnected(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    character(caps).map(LogEvent::PlayerReconnected)
}

fn character_connected(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    character(caps).map(LogEvent::PlayerCharacterConnected)
}

fn disconnected(caps: &Captures<'_>) -> Result<LogEvent, DecodeError> {
    let reason = caps
        .name("reason")
        .map(|m| m.as_str().trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    Ok(LogEvent::PlayerDisconnected {
        approved_user_index: int(caps, "approved")?,
        reason,
    })
}
