//! CLI bootstrap - the composition root.
//!
//! All concrete adapters are instantiated here:
//! - player store (JSON file or in memory)
//! - player-details HTTP client
//! - process output and log mirror sinks
//! - RCON announcer
//!
//! Handlers receive the composed [`CliContext`].

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use vigil_core::{
    AnnouncerPort, NoopAnnouncer, NoopLogSink, PlayerDetailsPort, PlayerStorePort, ProcessLogSink,
    VigilConfig, validate_config,
};
use vigil_ops::{OperationContext, OperationManager, RconClient};
use vigil_runtime::{
    BroadcastEmitter, EngineDeps, FileLogSink, HttpPlayerDetails, InMemoryPlayerStore,
    JsonFilePlayerStore, ServerEngine,
};

use crate::error::CliError;

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub config: VigilConfig,
    pub engine: ServerEngine,
    pub operations: Arc<OperationManager>,
}

/// Read and validate the configuration.
///
/// Without a path the defaults are used, which fail validation until a
/// server executable is configured.
pub fn load_config(path: Option<&Path>) -> Result<VigilConfig, CliError> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
            VigilConfig::from_json_str(&json)?
        }
        None => VigilConfig::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Wire adapters, engine and operations together.
pub async fn bootstrap(config: VigilConfig) -> Result<CliContext, CliError> {
    let store: Arc<dyn PlayerStorePort> = match &config.storage.players_file {
        Some(path) => Arc::new(
            JsonFilePlayerStore::open(path)
                .await
                .map_err(|e| CliError::Io(e.to_string()))?,
        ),
        None => {
            debug!("No players file configured, keeping players in memory");
            Arc::new(InMemoryPlayerStore::new())
        }
    };

    let details = HttpPlayerDetails::from_config(&config.player_api)
        .map_err(|e| CliError::Config(e.to_string()))?
        .map(|client| Arc::new(client) as Arc<dyn PlayerDetailsPort>);

    let process_log: Arc<dyn ProcessLogSink> = match &config.server.process_log_file {
        Some(path) => Arc::new(FileLogSink::open(path)?),
        None => Arc::new(NoopLogSink),
    };

    let mirror = match &config.watcher.mirror_file {
        Some(path) => Some(Arc::new(FileLogSink::open(path)?) as Arc<dyn ProcessLogSink>),
        None => None,
    };

    let emitter = BroadcastEmitter::new();
    let engine = ServerEngine::new(
        &config,
        EngineDeps {
            details,
            store,
            process_log,
            mirror,
            emitter,
        },
    )
    .map_err(|e| CliError::Config(e.to_string()))?;

    let announcer: Arc<dyn AnnouncerPort> = if config.rcon.enabled {
        info!(host = %config.rcon.host, port = config.rcon.port, "RCON announcements enabled");
        Arc::new(RconClient::new(config.rcon.clone()))
    } else {
        Arc::new(NoopAnnouncer)
    };

    let ctx = OperationContext {
        control: Arc::new(engine.clone()),
        announcer,
        emitter: engine.emitter(),
    };
    let operations = OperationManager::new(&config.operations, &ctx);

    Ok(CliContext {
        config,
        engine,
        operations,
    })
}
