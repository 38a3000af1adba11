//! Supervision of the single dedicated-server process.
//!
//! # Structure
//!
//! - `platform` - host platform detection and launch plans
//! - `stream` - stdout/stderr readers feeding the process log
//! - `shutdown` - SIGTERM → SIGKILL escalation
//! - `log_sink` - file-backed process log

mod log_sink;
mod platform;
mod shutdown;
mod stream;

pub use log_sink::FileLogSink;
pub use platform::{HostPlatform, LaunchPlan};
pub use shutdown::shutdown_child;
pub use stream::spawn_stream_reader;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_core::{ProcessError, ProcessLogSink};

/// Broadcast channel capacity for supervisor signals.
const SIGNAL_CAPACITY: usize = 16;

/// Lifecycle signals of the supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorSignal {
    Started { pid: Option<u32> },
    Stopped { exit_code: Option<i32> },
    Error { message: String },
}

/// Stays in the slot until the process has been reaped, including while a
/// stop is waiting out the grace period.
struct RunningProcess {
    pid: Option<u32>,
    generation: u64,
    stop: CancellationToken,
    /// Cancelled by the waiter once the slot has been cleared.
    exited: CancellationToken,
    /// Taken by the first `stop()`.
    waiter: Option<JoinHandle<()>>,
    stopping: bool,
}

#[derive(Default)]
struct Slot {
    running: Option<RunningProcess>,
    generation: u64,
}

/// Starts and stops the server process and reports its lifecycle.
///
/// At most one process is supervised at a time.
pub struct ProcessSupervisor {
    plan: Result<LaunchPlan, String>,
    grace: Duration,
    sink: Arc<dyn ProcessLogSink>,
    signals: broadcast::Sender<SupervisorSignal>,
    slot: Arc<Mutex<Slot>>,
}

impl ProcessSupervisor {
    /// Create a supervisor for a resolved platform.
    ///
    /// An unsupported platform is reported by [`Self::start`], not here, so
    /// tooling that never launches still works.
    pub fn new(
        platform: Result<HostPlatform, ProcessError>,
        config: &vigil_core::ServerConfig,
        sink: Arc<dyn ProcessLogSink>,
    ) -> Self {
        let plan = platform
            .map(|p| LaunchPlan::build(p, config))
            .map_err(|e| match e {
                ProcessError::UnsupportedPlatform(name) => name,
                other => other.to_string(),
            });
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            plan,
            grace: Duration::from_secs(config.stop_grace_secs),
            sink,
            signals,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Subscribe to lifecycle signals.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorSignal> {
        self.signals.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.running.is_some()
    }

    pub async fn pid(&self) -> Option<u32> {
        self.slot.lock().await.running.as_ref().and_then(|r| r.pid)
    }

    /// Spawn the process.
    ///
    /// Emits `Started` on success and `Error` on spawn failure.
    pub async fn start(&self) -> Result<Option<u32>, ProcessError> {
        let plan = match self.plan {
            Ok(ref plan) => plan,
            Err(ref reason) => {
                return Err(ProcessError::UnsupportedPlatform(reason.clone()));
            }
        };

        let mut slot = self.slot.lock().await;
        if let Some(ref running) = slot.running {
            debug!(pid = ?running.pid, stopping = running.stopping, "Start rejected");
            return Err(ProcessError::AlreadyRunning(running.pid));
        }

        let mut cmd = Command::new(&plan.program);
        cmd.args(&plan.args)
            .envs(&plan.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = plan.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("{}: {e}", plan.program.to_string_lossy());
                error!(error = %message, "Failed to spawn server process");
                let _ = self.signals.send(SupervisorSignal::Error {
                    message: message.clone(),
                });
                return Err(ProcessError::SpawnFailed(message));
            }
        };

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, "stdout", Arc::clone(&self.sink));
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, "stderr", Arc::clone(&self.sink));
        }

        slot.generation += 1;
        let generation = slot.generation;
        let stop = CancellationToken::new();
        let exited = CancellationToken::new();
        let waiter = {
            let stop = stop.clone();
            let exited = exited.clone();
            let signals = self.signals.clone();
            let slot_ref = Arc::clone(&self.slot);
            let grace = self.grace;
            tokio::spawn(async move {
                let status = tokio::select! {
                    status = child.wait() => status,
                    () = stop.cancelled() => shutdown_child(&mut child, grace).await,
                };

                let exit_code = match status {
                    Ok(status) => {
                        info!(?pid, code = ?status.code(), "Server process exited");
                        status.code()
                    }
                    Err(e) => {
                        error!(?pid, error = %e, "Lost track of server process");
                        let _ = signals.send(SupervisorSignal::Error {
                            message: e.to_string(),
                        });
                        None
                    }
                };

                let mut slot = slot_ref.lock().await;
                if slot
                    .running
                    .as_ref()
                    .is_some_and(|r| r.generation == generation)
                {
                    slot.running = None;
                }
                drop(slot);
                exited.cancel();

                let _ = signals.send(SupervisorSignal::Stopped { exit_code });
            })
        };

        slot.running = Some(RunningProcess {
            pid,
            generation,
            stop,
            exited,
            waiter: Some(waiter),
            stopping: false,
        });
        info!(?pid, program = %plan.program.to_string_lossy(), "Server process started");
        // Sent under the slot lock so `Stopped` can never overtake it.
        let _ = self.signals.send(SupervisorSignal::Started { pid });
        drop(slot);
        Ok(pid)
    }

    /// Stop the process and wait for it to exit. No-op if nothing runs.
    ///
    /// Runs the platform shutdown script afterwards, if configured.
    pub async fn stop(&self) -> Result<(), ProcessError> {
        let (pid, stop, exited, waiter) = {
            let mut slot = self.slot.lock().await;
            let Some(running) = slot.running.as_mut() else {
                debug!("Stop requested with no server process running");
                return Ok(());
            };
            running.stopping = true;
            (
                running.pid,
                running.stop.clone(),
                running.exited.clone(),
                running.waiter.take(),
            )
        };

        let Some(waiter) = waiter else {
            debug!(?pid, "Stop already in progress, waiting for exit");
            exited.cancelled().await;
            return Ok(());
        };

        info!(?pid, "Stopping server process");
        stop.cancel();
        waiter
            .await
            .map_err(|e| ProcessError::StopFailed(e.to_string()))?;

        self.run_shutdown_script().await;
        Ok(())
    }

    async fn run_shutdown_script(&self) {
        let Some(script) = self
            .plan
            .as_ref()
            .ok()
            .and_then(|p| p.shutdown_script.as_ref())
        else {
            return;
        };

        match Command::new(script).status().await {
            Ok(status) if status.success() => {
                debug!(script = %script.display(), "Shutdown script finished");
            }
            Ok(status) => {
                warn!(script = %script.display(), code = ?status.code(), "Shutdown script failed");
            }
            Err(e) => {
                warn!(script = %script.display(), error = %e, "Shutdown script could not run");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vigil_core::{NoopLogSink, ServerConfig};

    fn shell(script: &str) -> ServerConfig {
        ServerConfig {
            executable: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
            stop_grace_secs: 2,
            ..ServerConfig::default()
        }
    }

    fn supervisor(config: &ServerConfig) -> ProcessSupervisor {
        ProcessSupervisor::new(
            Ok(HostPlatform::Linux),
            config,
            Arc::new(NoopLogSink),
        )
    }

    #[tokio::test]
    async fn test_unsupported_platform_fails_fast() {
        let config = shell("true");
        let sup = ProcessSupervisor::new(
            HostPlatform::resolve(Some("plan9")),
            &config,
            Arc::new(NoopLogSink),
        );
        assert!(matches!(
            sup.start().await,
            Err(ProcessError::UnsupportedPlatform(_))
        ));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected_then_stop() {
        let config = shell("sleep 30");
        let sup = supervisor(&config);
        let mut signals = sup.subscribe();

        let pid = sup.start().await.unwrap();
        assert!(pid.is_some());
        assert_eq!(
            signals.recv().await.unwrap(),
            SupervisorSignal::Started { pid }
        );
        assert!(matches!(
            sup.start().await,
            Err(ProcessError::AlreadyRunning(_))
        ));

        sup.stop().await.unwrap();
        assert!(matches!(
            signals.recv().await.unwrap(),
            SupervisorSignal::Stopped { .. }
        ));
        assert!(!sup.is_running().await);
    }

    #[tokio::test]
    async fn test_natural_exit_reports_code() {
        let config = shell("exit 3");
        let sup = supervisor(&config);
        let mut signals = sup.subscribe();

        sup.start().await.unwrap();
        let _started = signals.recv().await.unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stopped, SupervisorSignal::Stopped { exit_code: Some(3) });
        assert!(!sup.is_running().await);
    }

    #[tokio::test]
    async fn test_start_rejected_until_stopping_process_exits() {
        let mut config = shell("trap '' TERM; exec sleep 30");
        config.stop_grace_secs = 1;
        let sup = Arc::new(supervisor(&config));

        let first = sup.start().await.unwrap();
        // Give the shell time to install the trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopping = {
            let sup = Arc::clone(&sup);
            tokio::spawn(async move { sup.stop().await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(sup.is_running().await);
        assert_eq!(sup.pid().await, first);
        assert!(matches!(
            sup.start().await,
            Err(ProcessError::AlreadyRunning(pid)) if pid == first
        ));

        // A second stop waits for the same exit.
        sup.stop().await.unwrap();
        assert!(!sup.is_running().await);
        stopping.await.unwrap().unwrap();

        sup.start().await.unwrap();
        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let sup = supervisor(&shell("true"));
        assert!(sup.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_spawn_failure_emits_error() {
        let config = ServerConfig {
            executable: PathBuf::from("/nonexistent/server-binary"),
            args: Vec::new(),
            ..ServerConfig::default()
        };
        let sup = supervisor(&config);
        let mut signals = sup.subscribe();

        assert!(matches!(
            sup.start().await,
            Err(ProcessError::SpawnFailed(_))
        ));
        assert!(matches!(
            signals.recv().await.unwrap(),
            SupervisorSignal::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_shutdown_script_runs_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("stopped");
        let script = dir.path().join("stop.sh");
        std::fs::write(&script, format!("#!/bin/sh\ntouch {}\n", marker.display())).unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        // Let concurrently forked test processes drop the inherited write fd.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut config = shell("sleep 30");
        config.shutdown_script = Some(script);
        let sup = supervisor(&config);

        sup.start().await.unwrap();
        sup.stop().await.unwrap();
        assert!(marker.exists());
    }
}
