//! Configuration types and validation.
//!
//! `VigilConfig` is loaded from a camelCase JSON document. Every section and
//! every field has a default so partial documents are accepted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay for user-scheduled restarts and stops.
pub const DEFAULT_OPERATION_DELAY_MINUTES: u64 = 5;

/// Default RCON port of the dedicated server.
pub const DEFAULT_RCON_PORT: u16 = 27015;

/// Placeholder in [`ServerConfig::args`] replaced with the log file path.
pub const LOG_FILE_PLACEHOLDER: &str = "{logFile}";

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct VigilConfig {
    pub server: ServerConfig,
    pub watcher: WatcherConfig,
    pub operations: OperationsConfig,
    pub rcon: RconConfig,
    pub player_api: PlayerApiConfig,
    pub storage: StorageConfig,
}

/// How to launch and stop the dedicated server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Server executable.
    pub executable: PathBuf,
    /// Process arguments. `{logFile}` is replaced with [`Self::log_file`].
    pub args: Vec<String>,
    /// Extra environment for the process (launcher settings such as
    /// `WINEDEBUG`).
    pub environment: BTreeMap<String, String>,
    /// Working directory for the process (defaults to the executable's
    /// directory).
    pub working_dir: Option<PathBuf>,
    /// Log file the server writes and vigil tails.
    pub log_file: PathBuf,
    /// File receiving the process's stdout/stderr.
    pub process_log_file: Option<PathBuf>,
    /// Host platform override (`"windows"` or `"linux"`). Detected when unset.
    pub platform: Option<String>,
    /// Linux launcher such as `wine`. The executable becomes its first
    /// argument.
    pub launcher: Option<String>,
    /// Extra library search path exported as `LD_LIBRARY_PATH` on Linux.
    pub library_path: Option<PathBuf>,
    /// Script run after the process exits on Linux.
    pub shutdown_script: Option<PathBuf>,
    /// Seconds between SIGTERM and SIGKILL.
    pub stop_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            args: ["-batchmode", "-nographics", "-logFile", LOG_FILE_PLACEHOLDER]
                .into_iter()
                .map(String::from)
                .collect(),
            environment: BTreeMap::new(),
            working_dir: None,
            log_file: PathBuf::from("server.log"),
            process_log_file: None,
            platform: None,
            launcher: None,
            library_path: None,
            shutdown_script: None,
            stop_grace_secs: 30,
        }
    }
}

/// Log tailing parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct WatcherConfig {
    /// How long to wait for the log file to appear.
    pub wait_timeout_secs: u64,
    /// Poll period for new data.
    pub poll_interval_ms: u64,
    /// Audit copy of every raw line read from the log.
    pub mirror_file: Option<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 120,
            poll_interval_ms: 250,
            mirror_file: None,
        }
    }
}

impl WatcherConfig {
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Operation defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct OperationsConfig {
    pub restart_delay_minutes: u64,
    pub stop_delay_minutes: u64,
    /// Upper bound for stop + start + ready.
    pub restart_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    /// Real time per countdown tick. Each tick counts down one minute.
    pub tick_interval_secs: u64,
    /// Six-field cron expression (with seconds) for the periodic restart.
    pub periodic_restart_cron: Option<String>,
    /// IANA timezone the cron expression is evaluated in.
    pub timezone: String,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            restart_delay_minutes: DEFAULT_OPERATION_DELAY_MINUTES,
            stop_delay_minutes: DEFAULT_OPERATION_DELAY_MINUTES,
            restart_timeout_secs: 600,
            stop_timeout_secs: 120,
            tick_interval_secs: 60,
            periodic_restart_cron: None,
            timezone: "UTC".to_string(),
        }
    }
}

/// RCON command channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RconConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Close the connection after this many quiet seconds.
    pub idle_disconnect_secs: u64,
    pub connect_timeout_secs: u64,
    /// Command template for announcements; `{message}` is substituted.
    pub announce_template: String,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_RCON_PORT,
            password: String::new(),
            idle_disconnect_secs: 30,
            connect_timeout_secs: 5,
            announce_template: "say {message}".to_string(),
        }
    }
}

/// Player-details HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerApiConfig {
    /// Base URL; enrichment is disabled when unset.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PlayerApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 5,
        }
    }
}

/// Durable storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    /// JSON player table. Kept in memory only when unset.
    pub players_file: Option<PathBuf>,
}

impl VigilConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))
    }
}

/// Settings validation errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Config could not be parsed: {0}")]
    Parse(String),

    #[error("Server executable must be set")]
    MissingExecutable,

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("Unknown platform '{0}', expected 'windows' or 'linux'")]
    InvalidPlatform(String),

    #[error("RCON port must be non-zero")]
    InvalidRconPort,

    #[error("Invalid player API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

/// Parse a six-field cron expression (seconds first).
///
/// Seven-field expressions with a year are rejected since the job scheduler
/// does not accept them.
pub fn validate_cron(expr: &str) -> Result<(), SettingsError> {
    let invalid = |reason: String| SettingsError::InvalidCron {
        expr: expr.to_string(),
        reason,
    };
    let fields = expr.split_whitespace().count();
    if fields != 6 {
        return Err(invalid(format!("expected 6 fields, found {fields}")));
    }
    cron::Schedule::from_str(expr)
        .map(|_| ())
        .map_err(|e| invalid(e.to_string()))
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<chrono_tz::Tz, SettingsError> {
    name.parse::<chrono_tz::Tz>()
        .map_err(|_| SettingsError::InvalidTimezone(name.to_string()))
}

/// Validate configuration values.
pub fn validate_config(config: &VigilConfig) -> Result<(), SettingsError> {
    if config.server.executable.as_os_str().is_empty() {
        return Err(SettingsError::MissingExecutable);
    }
    if let Some(ref platform) = config.server.platform {
        if !matches!(platform.as_str(), "windows" | "linux") {
            return Err(SettingsError::InvalidPlatform(platform.clone()));
        }
    }

    let ops = &config.operations;
    for (name, value) in [
        ("operations.restartDelayMinutes", ops.restart_delay_minutes),
        ("operations.stopDelayMinutes", ops.stop_delay_minutes),
        ("operations.restartTimeoutSecs", ops.restart_timeout_secs),
        ("operations.stopTimeoutSecs", ops.stop_timeout_secs),
        ("operations.tickIntervalSecs", ops.tick_interval_secs),
        ("watcher.pollIntervalMs", config.watcher.poll_interval_ms),
    ] {
        if value == 0 {
            return Err(SettingsError::NonPositive(name));
        }
    }

    if let Some(ref cron) = ops.periodic_restart_cron {
        validate_cron(cron)?;
    }
    parse_timezone(&ops.timezone)?;

    if config.rcon.enabled && config.rcon.port == 0 {
        return Err(SettingsError::InvalidRconPort);
    }

    if let Some(ref base) = config.player_api.base_url {
        url::Url::parse(base).map_err(|e| SettingsError::InvalidApiUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> VigilConfig {
        let mut config = VigilConfig::default();
        config.server.executable = PathBuf::from("/srv/game/Server.exe");
        config
    }

    #[test]
    fn test_defaults() {
        let config = VigilConfig::default();
        assert_eq!(config.operations.restart_delay_minutes, 5);
        assert_eq!(config.operations.tick_interval_secs, 60);
        assert_eq!(config.rcon.port, DEFAULT_RCON_PORT);
        assert_eq!(config.operations.timezone, "UTC");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = VigilConfig::from_json_str(
            r#"{"server":{"executable":"srv.exe"},"rcon":{"enabled":true,"password":"pw"}}"#,
        )
        .unwrap();
        assert_eq!(config.server.executable, PathBuf::from("srv.exe"));
        assert!(config.rcon.enabled);
        assert_eq!(config.rcon.host, "127.0.0.1");
        assert_eq!(config.watcher.wait_timeout_secs, 120);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            VigilConfig::from_json_str("{not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_missing_executable() {
        assert_eq!(
            validate_config(&VigilConfig::default()),
            Err(SettingsError::MissingExecutable)
        );
    }

    #[test]
    fn test_validate_zero_delay() {
        let mut config = valid();
        config.operations.stop_delay_minutes = 0;
        assert_eq!(
            validate_config(&config),
            Err(SettingsError::NonPositive("operations.stopDelayMinutes"))
        );
    }

    #[test]
    fn test_validate_zero_stop_timeout() {
        let mut config = valid();
        config.operations.stop_timeout_secs = 0;
        assert_eq!(
            validate_config(&config),
            Err(SettingsError::NonPositive("operations.stopTimeoutSecs"))
        );
    }

    #[test]
    fn test_validate_cron_parses_fields() {
        assert!(validate_cron("0 30 4 * * *").is_ok());
        assert!(validate_cron("0 0 */6 * * MON-FRI").is_ok());

        // Six words are not enough.
        assert!(matches!(
            validate_cron("a b c d e f"),
            Err(SettingsError::InvalidCron { .. })
        ));
        assert!(validate_cron("0 61 4 * * *").is_err());
        assert!(validate_cron("0 0 25 * * *").is_err());
        // Year field
        assert!(validate_cron("0 0 4 * * * 2030").is_err());
        // Minutes-first five-field form
        assert!(validate_cron("0 4 * * *").is_err());
    }

    #[test]
    fn test_validate_cron_and_timezone() {
        let mut config = valid();
        config.operations.periodic_restart_cron = Some("0 0 4 * * *".to_string());
        config.operations.timezone = "Europe/Berlin".to_string();
        assert!(validate_config(&config).is_ok());

        config.operations.periodic_restart_cron = Some("every day".to_string());
        assert!(matches!(
            validate_config(&config),
            Err(SettingsError::InvalidCron { .. })
        ));

        config.operations.periodic_restart_cron = None;
        config.operations.timezone = "Mars/Olympus".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(SettingsError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_validate_api_url() {
        let mut config = valid();
        config.player_api.base_url = Some("not a url".to_string());
        assert!(matches!(
            validate_config(&config),
            Err(SettingsError::InvalidApiUrl { .. })
        ));
    }

    #[test]
    fn test_validate_platform() {
        let mut config = valid();
        config.server.platform = Some("macos".to_string());
        assert_eq!(
            validate_config(&config),
            Err(SettingsError::InvalidPlatform("macos".to_string()))
        );
    }
}
