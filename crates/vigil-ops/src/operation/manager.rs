//! Registry of operation schedulers with global exclusivity.
//!
//! At most one foreground operation is active at a time. Background
//! operations bypass the check; their cron triggers come back through
//! [`PeriodicTrigger`] and start the target like any other request.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vigil_core::{OperationInfo, OperationType, OperationsConfig};

use super::scheduler::{OperationContext, OperationScheduler, PeriodicTrigger};
use crate::error::OperationError;

/// `scheduled_by` for operations started by a cron trigger.
pub const PERIODIC_USER: &str = "periodic";

/// Optional parameters for [`OperationManager::start_operation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParams {
    /// Countdown length; the configured default when unset.
    pub delay_minutes: Option<u64>,
    /// Cron expression for background operations.
    pub cron: Option<String>,
    pub timezone: Option<String>,
}

/// Result of a start request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(OperationInfo),
    /// Another foreground operation is active. Nothing changed.
    Rejected { active: OperationInfo },
}

pub struct OperationManager {
    schedulers: HashMap<OperationType, OperationScheduler>,
    config: OperationsConfig,
    start_lock: Mutex<()>,
    trigger_loop: Mutex<Option<JoinHandle<()>>>,
}

impl OperationManager {
    /// Build the registry and start listening for cron triggers.
    pub fn new(config: &OperationsConfig, ctx: &OperationContext) -> Arc<Self> {
        let (triggers, rx) = mpsc::unbounded_channel();
        let tick = Duration::from_secs(config.tick_interval_secs);

        let schedulers = OperationType::ALL
            .into_iter()
            .map(|op| {
                let scheduler = OperationScheduler::new(
                    op,
                    effect_timeout(config, op),
                    tick,
                    ctx.clone(),
                    triggers.clone(),
                );
                (op, scheduler)
            })
            .collect();

        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            schedulers,
            config: config.clone(),
            start_lock: Mutex::new(()),
            trigger_loop: Mutex::new(Some(tokio::spawn(run_triggers(weak.clone(), rx)))),
        })
    }

    fn scheduler(&self, op: OperationType) -> Result<&OperationScheduler, OperationError> {
        self.schedulers
            .get(&op)
            .ok_or_else(|| OperationError::NoOperationDefined(op.to_string()))
    }

    fn resolve(&self, name: &str) -> Result<&OperationScheduler, OperationError> {
        let op: OperationType = name
            .parse()
            .map_err(OperationError::NoOperationDefined)?;
        self.scheduler(op)
    }

    /// Start an operation by name.
    ///
    /// Foreground operations get a countdown of `params.delay_minutes`
    /// (or the configured default) unless another foreground operation is
    /// active. Background operations register their cron schedule.
    pub async fn start_operation(
        &self,
        name: &str,
        user: &str,
        params: StartParams,
    ) -> Result<StartOutcome, OperationError> {
        let scheduler = self.resolve(name)?;
        let op = scheduler.operation_type();

        if op.definition().is_background {
            let cron = params
                .cron
                .or_else(|| self.config.periodic_restart_cron.clone())
                .ok_or_else(|| {
                    OperationError::InvalidArgument(format!("'{op}' needs a cron expression"))
                })?;
            let timezone = params
                .timezone
                .unwrap_or_else(|| self.config.timezone.clone());
            return scheduler
                .schedule_periodic(user, &cron, &timezone)
                .await
                .map(StartOutcome::Started);
        }

        let _guard = self.start_lock.lock().await;
        if let Some(active) = self.current_operation().await {
            info!(
                requested = %op,
                active = %active.operation_type,
                %user,
                "Operation not started, another one is active"
            );
            return Ok(StartOutcome::Rejected { active });
        }

        let delay = params
            .delay_minutes
            .unwrap_or_else(|| default_delay(&self.config, op));
        scheduler
            .schedule_operation(user, delay)
            .await
            .map(StartOutcome::Started)
    }

    /// Register the periodic restart.
    pub async fn schedule_periodic(
        &self,
        cron: &str,
        timezone: &str,
    ) -> Result<OperationInfo, OperationError> {
        let params = StartParams {
            cron: Some(cron.to_string()),
            timezone: Some(timezone.to_string()),
            ..StartParams::default()
        };
        match self
            .start_operation(OperationType::PeriodicRestart.as_str(), "config", params)
            .await?
        {
            StartOutcome::Started(info) | StartOutcome::Rejected { active: info } => Ok(info),
        }
    }

    /// Cancel an operation by name. `false` if it was not scheduled.
    pub async fn stop_operation(&self, name: &str, user: &str) -> Result<bool, OperationError> {
        self.resolve(name)?.stop(user).await
    }

    /// The active foreground operation, if any.
    pub async fn current_operation(&self) -> Option<OperationInfo> {
        for op in OperationType::ALL {
            if op.definition().is_background {
                continue;
            }
            let Some(scheduler) = self.schedulers.get(&op) else {
                continue;
            };
            let info = scheduler.info().await;
            if info.is_active() {
                return Some(info);
            }
        }
        None
    }

    /// Every registered operation in registry order.
    pub async fn list_operations(&self) -> Vec<OperationInfo> {
        let mut infos = Vec::with_capacity(self.schedulers.len());
        for op in OperationType::ALL {
            if let Some(scheduler) = self.schedulers.get(&op) {
                infos.push(scheduler.info().await);
            }
        }
        infos
    }

    /// Cancel everything scheduled and stop listening for triggers.
    ///
    /// Effects already running are left to finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.trigger_loop.lock().await.take() {
            handle.abort();
        }
        for op in OperationType::ALL {
            let Some(scheduler) = self.schedulers.get(&op) else {
                continue;
            };
            match scheduler.stop("shutdown").await {
                Ok(true) => debug!(operation = %op, "Cancelled on shutdown"),
                Ok(false) => {}
                Err(e) => warn!(operation = %op, error = %e, "Left running on shutdown"),
            }
        }
        info!("Operation manager shut down");
    }
}

const fn default_delay(config: &OperationsConfig, op: OperationType) -> u64 {
    match op {
        OperationType::Stop => config.stop_delay_minutes,
        OperationType::Restart | OperationType::PeriodicRestart => config.restart_delay_minutes,
    }
}

const fn effect_timeout(config: &OperationsConfig, op: OperationType) -> Duration {
    match op {
        OperationType::Stop => Duration::from_secs(config.stop_timeout_secs),
        OperationType::Restart | OperationType::PeriodicRestart => {
            Duration::from_secs(config.restart_timeout_secs)
        }
    }
}

async fn run_triggers(
    manager: Weak<OperationManager>,
    mut rx: mpsc::UnboundedReceiver<PeriodicTrigger>,
) {
    while let Some(trigger) = rx.recv().await {
        let Some(manager) = manager.upgrade() else {
            break;
        };
        info!(source = %trigger.source, target = %trigger.target, "Periodic trigger");
        match manager
            .start_operation(
                trigger.target.as_str(),
                PERIODIC_USER,
                StartParams::default(),
            )
            .await
        {
            Ok(StartOutcome::Started(_)) => {}
            Ok(StartOutcome::Rejected { active }) => {
                info!(active = %active.operation_type, "Periodic trigger skipped");
            }
            Err(e) => warn!(target = %trigger.target, error = %e, "Periodic trigger failed"),
        }
    }
    debug!("Trigger loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_support::{FakeAnnouncer, FakeControl, RecordingEmitter};
    use vigil_core::OperationStatus;

    fn manager() -> (Arc<OperationManager>, RecordingEmitter) {
        let emitter = RecordingEmitter::default();
        let ctx = OperationContext {
            control: Arc::new(FakeControl::default()),
            announcer: Arc::new(FakeAnnouncer::default()),
            emitter: Arc::new(emitter.clone()),
        };
        (
            OperationManager::new(&OperationsConfig::default(), &ctx),
            emitter,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_foreground_operation_is_rejected() {
        let (manager, _emitter) = manager();

        let started = manager
            .start_operation("restart", "alice", StartParams::default())
            .await
            .unwrap();
        let StartOutcome::Started(restart) = started else {
            panic!("restart should start");
        };
        assert_eq!(restart.total_delay_ms, 5 * 60_000);

        let outcome = manager
            .start_operation(
                "stop",
                "bob",
                StartParams {
                    delay_minutes: Some(1),
                    ..StartParams::default()
                },
            )
            .await
            .unwrap();
        match outcome {
            StartOutcome::Rejected { active } => {
                assert_eq!(active.operation_type, OperationType::Restart);
                assert_eq!(active.scheduled_by.as_deref(), Some("alice"));
            }
            StartOutcome::Started(_) => panic!("stop must be rejected"),
        }

        let infos = manager.list_operations().await;
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[1].status, OperationStatus::Idle);
        assert_eq!(
            manager.current_operation().await.unwrap().operation_type,
            OperationType::Restart
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_operation() {
        let (manager, _emitter) = manager();
        assert!(matches!(
            manager
                .start_operation("reboot", "alice", StartParams::default())
                .await,
            Err(OperationError::NoOperationDefined(name)) if name == "reboot"
        ));
        assert!(matches!(
            manager.stop_operation("reboot", "alice").await,
            Err(OperationError::NoOperationDefined(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_operation_frees_the_slot() {
        let (manager, _emitter) = manager();
        manager
            .start_operation("restart", "alice", StartParams::default())
            .await
            .unwrap();

        assert!(manager.stop_operation("restart", "alice").await.unwrap());
        assert!(manager.current_operation().await.is_none());

        let outcome = manager
            .start_operation("stop", "bob", StartParams::default())
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Started(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_needs_cron() {
        let (manager, _emitter) = manager();
        assert!(matches!(
            manager
                .start_operation("periodic-restart", "alice", StartParams::default())
                .await,
            Err(OperationError::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_starts_target_with_default_delay() {
        let (manager, emitter) = manager();

        manager.schedulers[&OperationType::PeriodicRestart]
            .trigger_sender()
            .send(PeriodicTrigger {
                source: OperationType::PeriodicRestart,
                target: OperationType::Restart,
            })
            .unwrap();

        for _ in 0..100 {
            if manager.current_operation().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let active = manager.current_operation().await.unwrap();
        assert_eq!(active.operation_type, OperationType::Restart);
        assert_eq!(active.scheduled_by.as_deref(), Some(PERIODIC_USER));
        assert_eq!(emitter.names(), vec!["operation:scheduled"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_background_bypasses_exclusivity() {
        let (manager, _emitter) = manager();
        manager
            .start_operation("restart", "alice", StartParams::default())
            .await
            .unwrap();

        let info = manager
            .schedule_periodic("0 0 4 * * *", "UTC")
            .await
            .unwrap();
        assert_eq!(info.operation_type, OperationType::PeriodicRestart);
        assert_eq!(info.status, OperationStatus::Scheduled);

        manager.shutdown().await;
        assert!(
            manager
                .list_operations()
                .await
                .iter()
                .all(|i| i.status == OperationStatus::Idle)
        );
    }
}
