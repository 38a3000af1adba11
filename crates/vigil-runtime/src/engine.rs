//! Server engine: composition of the supervisor, log watcher, decoder,
//! state aggregator and player tracker for one dedicated server.
//!
//! # Lifecycle
//!
//! `start()` reconciles players, spawns the process and follows its log. A
//! pump task feeds each line through the decoder into the aggregator or the
//! tracker, strictly in file order. A monitor task reacts to the process
//! exiting by ending the watch, draining the pump and resetting state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vigil_core::{
    AppEvent, AppEventEmitter, PlayerDetailsPort, PlayerRecord, PlayerSession, PlayerStorePort,
    ProcessError, ProcessLogSink, ServerConfig, ServerControlPort, ServerDomainState, StoreError,
    VigilConfig,
};

use crate::decoder::LogLineDecoder;
use crate::emitter::BroadcastEmitter;
use crate::players::PlayerSessionTracker;
use crate::process::{HostPlatform, ProcessSupervisor, SupervisorSignal};
use crate::state::ServerStateAggregator;
use crate::watcher::LogStreamWatcher;

/// Adapters injected into the engine.
pub struct EngineDeps {
    pub details: Option<Arc<dyn PlayerDetailsPort>>,
    pub store: Arc<dyn PlayerStorePort>,
    /// Receives the process's stdout and stderr.
    pub process_log: Arc<dyn ProcessLogSink>,
    /// Receives a copy of every server log line read.
    pub mirror: Option<Arc<dyn ProcessLogSink>>,
    pub emitter: BroadcastEmitter,
}

struct EngineInner {
    log_path: PathBuf,
    wait_timeout: Duration,
    supervisor: ProcessSupervisor,
    watcher: LogStreamWatcher,
    decoder: LogLineDecoder,
    aggregator: Mutex<ServerStateAggregator>,
    ready: watch::Receiver<bool>,
    tracker: PlayerSessionTracker,
    emitter: BroadcastEmitter,
    /// Monitor task of the current process lifetime.
    monitor: Mutex<Option<JoinHandle<()>>>,
}

/// Supervises one dedicated server and projects its log into state.
#[derive(Clone)]
pub struct ServerEngine {
    inner: Arc<EngineInner>,
}

impl ServerEngine {
    pub fn new(config: &VigilConfig, deps: EngineDeps) -> Result<Self, ProcessError> {
        let decoder =
            LogLineDecoder::new().map_err(|e| ProcessError::Configuration(e.to_string()))?;
        let platform = HostPlatform::resolve(config.server.platform.as_deref());
        let supervisor = ProcessSupervisor::new(platform, &config.server, deps.process_log);
        let watcher = LogStreamWatcher::new(config.watcher.poll_interval(), deps.mirror);

        let emitter: Arc<dyn AppEventEmitter> = Arc::new(deps.emitter.clone());
        let aggregator = ServerStateAggregator::new(Arc::clone(&emitter));
        let ready = aggregator.subscribe_ready();
        let tracker = PlayerSessionTracker::new(deps.details, deps.store, emitter);

        Ok(Self {
            inner: Arc::new(EngineInner {
                log_path: resolve_log_path(&config.server),
                wait_timeout: config.watcher.wait_timeout(),
                supervisor,
                watcher,
                decoder,
                aggregator: Mutex::new(aggregator),
                ready,
                tracker,
                emitter: deps.emitter,
                monitor: Mutex::new(None),
            }),
        })
    }

    /// Start the server and begin following its log.
    ///
    /// Returns once the log file is being followed. Readiness is reported
    /// separately through the `ready` event and [`Self::wait_until_ready`].
    pub async fn start(&self) -> Result<Option<u32>, ProcessError> {
        let inner = &self.inner;
        let mut monitor = inner.monitor.lock().await;

        if inner.supervisor.is_running().await {
            return Err(ProcessError::AlreadyRunning(inner.supervisor.pid().await));
        }
        if let Some(previous) = monitor.take() {
            let _ = previous.await;
        }

        inner.tracker.reconcile().await;
        inner.aggregator.lock().await.reset();
        remove_stale_log(&inner.log_path).await;

        let signals = inner.supervisor.subscribe();
        let pid = match inner.supervisor.start().await {
            Ok(pid) => pid,
            Err(e) => {
                if matches!(e, ProcessError::SpawnFailed(_)) {
                    inner.emitter.emit(AppEvent::server_error(e.to_string()));
                }
                return Err(e);
            }
        };
        inner.emitter.emit(AppEvent::server_started(pid));

        let (pump_tx, pump_rx) = oneshot::channel();
        let handle = tokio::spawn(monitor_process(Arc::clone(inner), signals, pump_rx));

        let lines = match inner
            .watcher
            .start_watching(&inner.log_path, inner.wait_timeout)
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Server log unavailable, stopping server");
                drop(pump_tx);
                if let Err(stop_err) = inner.supervisor.stop().await {
                    warn!(error = %stop_err, "Failed to stop server after log failure");
                }
                let _ = handle.await;
                return Err(ProcessError::LogUnavailable(e.to_string()));
            }
        };

        let _ = pump_tx.send(tokio::spawn(pump_lines(Arc::clone(inner), lines)));
        *monitor = Some(handle);
        Ok(pid)
    }

    /// Stop the server and wait until its lifetime is fully wound down.
    /// No-op if nothing is running.
    pub async fn stop(&self) -> Result<(), ProcessError> {
        let mut monitor = self.inner.monitor.lock().await;
        self.inner.supervisor.stop().await?;
        if let Some(handle) = monitor.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Stop, start and wait for readiness within `timeout`.
    pub async fn restart(&self, timeout: Duration) -> Result<(), ProcessError> {
        info!(timeout_secs = timeout.as_secs(), "Restarting server");
        self.stop().await?;
        self.start().await?;
        self.wait_until_ready(timeout).await
    }

    /// Wait until the current process lifetime reports ready.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ProcessError> {
        let mut ready = self.inner.ready.clone();
        let wait = async { ready.wait_for(|r| *r).await.map(|_| ()) };
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ProcessError::NotRunning),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Server did not become ready");
                Err(ProcessError::ReadyTimeout(timeout.as_secs()))
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.supervisor.is_running().await
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    pub async fn state(&self) -> ServerDomainState {
        self.inner.aggregator.lock().await.state().clone()
    }

    pub async fn connected_players(&self) -> Vec<PlayerSession> {
        self.inner.tracker.connected_players().await
    }

    pub async fn all_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        self.inner.tracker.all_players().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.inner.emitter.subscribe()
    }

    /// Emitter shared with operation schedulers.
    pub fn emitter(&self) -> Arc<dyn AppEventEmitter> {
        Arc::new(self.inner.emitter.clone())
    }

    pub fn tracker(&self) -> &PlayerSessionTracker {
        &self.inner.tracker
    }
}

#[async_trait]
impl ServerControlPort for ServerEngine {
    async fn stop_server(&self) -> Result<(), ProcessError> {
        self.stop().await
    }

    async fn restart_server(&self, timeout: Duration) -> Result<(), ProcessError> {
        self.restart(timeout).await
    }
}

/// A relative log file is written by the server relative to its working
/// directory.
fn resolve_log_path(config: &ServerConfig) -> PathBuf {
    if config.log_file.is_absolute() {
        return config.log_file.clone();
    }
    let base = config.working_dir.clone().or_else(|| {
        config
            .executable
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
    });
    match base {
        Some(dir) => dir.join(&config.log_file),
        None => config.log_file.clone(),
    }
}

async fn remove_stale_log(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed previous server log"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove previous server log"),
    }
}

async fn pump_lines(inner: Arc<EngineInner>, lines: impl Stream<Item = String>) {
    let mut lines = std::pin::pin!(lines);
    while let Some(line) = lines.next().await {
        let Some(event) = inner.decoder.decode(&line) else {
            continue;
        };
        if event.is_player_event() {
            inner.tracker.handle(&event).await;
        } else {
            inner.aggregator.lock().await.apply(&event);
        }
    }
    debug!("Log pump finished");
}

async fn monitor_process(
    inner: Arc<EngineInner>,
    mut signals: broadcast::Receiver<SupervisorSignal>,
    pump: oneshot::Receiver<JoinHandle<()>>,
) {
    let exit_code = loop {
        match signals.recv().await {
            Ok(SupervisorSignal::Stopped { exit_code }) => break exit_code,
            Ok(SupervisorSignal::Error { message }) => {
                inner.emitter.emit(AppEvent::server_error(message));
            }
            Ok(SupervisorSignal::Started { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Supervisor signals lagged");
            }
            Err(RecvError::Closed) => break None,
        }
    };

    inner.watcher.stop_watching();
    if let Ok(pump) = pump.await {
        let _ = pump.await;
    }
    inner.aggregator.lock().await.stop(exit_code);
    inner.tracker.reconcile().await;
    info!(?exit_code, "Server lifetime ended");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::players::InMemoryPlayerStore;
    use vigil_core::NoopLogSink;

    fn engine_with(script: &str, log_file: PathBuf, wait_timeout_secs: u64) -> ServerEngine {
        let mut config = VigilConfig::default();
        config.server.executable = PathBuf::from("/bin/sh");
        config.server.args = vec!["-c".to_string(), script.to_string(), "{logFile}".to_string()];
        config.server.log_file = log_file;
        config.server.platform = Some("linux".to_string());
        config.server.stop_grace_secs = 2;
        config.watcher.poll_interval_ms = 10;
        config.watcher.wait_timeout_secs = wait_timeout_secs;

        ServerEngine::new(
            &config,
            EngineDeps {
                details: None,
                store: Arc::new(InMemoryPlayerStore::new()),
                process_log: Arc::new(NoopLogSink),
                mirror: None,
                emitter: BroadcastEmitter::new(),
            },
        )
        .unwrap()
    }

    fn engine(script: &str, log_file: PathBuf) -> ServerEngine {
        engine_with(script, log_file, 5)
    }

    const SERVER_SCRIPT: &str = r#"
        echo '[10:00:00] Server version: 1.2.3' >> "$0"
        echo "User '{Steam 111}' '0', approvedUserIndex: 5, Character: 'Bob' connected as ID '1', Entity '9'" >> "$0"
        echo 'Server setup complete' >> "$0"
        sleep 30
    "#;

    #[tokio::test]
    async fn test_start_ready_stop() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("server.log");
        std::fs::write(&log, "stale line from last run\n").unwrap();

        let engine = engine(SERVER_SCRIPT, log);
        let mut events = engine.subscribe();

        engine.start().await.unwrap();
        engine
            .wait_until_ready(Duration::from_secs(5))
            .await
            .unwrap();

        let state = engine.state().await;
        assert_eq!(state.version.as_deref(), Some("1.2.3"));
        assert!(state.server_setup_complete);

        let players = engine.connected_players().await;
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].character_name.as_deref(), Some("Bob"));

        engine.stop().await.unwrap();
        assert!(!engine.is_running().await);
        assert!(!engine.is_ready());
        assert_eq!(engine.state().await, ServerDomainState::default());
        assert!(engine.connected_players().await.is_empty());

        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.event_name());
        }
        assert_eq!(names.first(), Some(&"server:started"));
        assert_eq!(names.last(), Some(&"server:stopped"));
        assert_eq!(names.iter().filter(|n| **n == "server:ready").count(), 1);
        assert!(names.contains(&"player:connected"));
    }

    #[tokio::test]
    async fn test_missing_log_stops_process() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with("sleep 30", dir.path().join("never.log"), 0);

        assert!(matches!(
            engine.start().await,
            Err(ProcessError::LogUnavailable(_))
        ));
        assert!(!engine.is_running().await);
    }

    #[tokio::test]
    async fn test_ready_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(r#"echo 'booting' >> "$0"; sleep 30"#, dir.path().join("s.log"));

        engine.start().await.unwrap();
        assert!(matches!(
            engine.wait_until_ready(Duration::from_millis(100)).await,
            Err(ProcessError::ReadyTimeout(_))
        ));
        engine.stop().await.unwrap();
    }

    #[test]
    fn test_relative_log_follows_working_dir() {
        let config = ServerConfig {
            executable: PathBuf::from("/srv/game/Server.exe"),
            log_file: PathBuf::from("logs/server.log"),
            ..ServerConfig::default()
        };
        assert_eq!(
            resolve_log_path(&config),
            PathBuf::from("/srv/game/logs/server.log")
        );
    }
}
