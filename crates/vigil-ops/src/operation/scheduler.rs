//! Scheduler for a single operation instance.
//!
//! Foreground operations run a countdown: every tick takes one minute off the
//! remaining time, publishes progress and announces it in game. At zero the
//! effect runs against the server. Background operations register a cron job
//! that asks the manager to start their target operation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_core::{
    AnnouncerPort, AppEvent, AppEventEmitter, OperationInfo, OperationStatus, OperationType,
    ServerControlPort, SettingsError, validate_cron,
};

use crate::error::OperationError;

/// One countdown tick in operation time.
pub const MINUTE_MS: u64 = 60_000;

/// Adapters shared by every scheduler.
#[derive(Clone)]
pub struct OperationContext {
    pub control: Arc<dyn ServerControlPort>,
    pub announcer: Arc<dyn AnnouncerPort>,
    pub emitter: Arc<dyn AppEventEmitter>,
}

/// Cron firing for a background operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTrigger {
    pub source: OperationType,
    pub target: OperationType,
}

struct SchedulerState {
    info: OperationInfo,
    countdown: Option<CancellationToken>,
    cron: Option<JobScheduler>,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    tick_interval: Duration,
    ctx: OperationContext,
    triggers: mpsc::UnboundedSender<PeriodicTrigger>,
}

/// Owns the lifecycle of one operation:
/// `Idle → Scheduled → Running → Completed | Failed`, or `Cancelled` from
/// `Scheduled`, and back to `Idle`.
#[derive(Clone)]
pub struct OperationScheduler {
    operation_type: OperationType,
    inner: Arc<SchedulerInner>,
}

impl OperationScheduler {
    pub fn new(
        operation_type: OperationType,
        timeout: Duration,
        tick_interval: Duration,
        ctx: OperationContext,
        triggers: mpsc::UnboundedSender<PeriodicTrigger>,
    ) -> Self {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Self {
            operation_type,
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedulerState {
                    info: OperationInfo::new(operation_type, timeout_ms),
                    countdown: None,
                    cron: None,
                }),
                tick_interval,
                ctx,
                triggers,
            }),
        }
    }

    pub const fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub async fn info(&self) -> OperationInfo {
        self.inner.state.lock().await.info.clone()
    }

    #[cfg(test)]
    pub(crate) fn trigger_sender(&self) -> mpsc::UnboundedSender<PeriodicTrigger> {
        self.inner.triggers.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.info.is_active()
    }

    /// Start a countdown of `delay_minutes` ticks.
    pub async fn schedule_operation(
        &self,
        user: &str,
        delay_minutes: u64,
    ) -> Result<OperationInfo, OperationError> {
        let op = self.operation_type;
        if op.definition().is_background {
            return Err(OperationError::PeriodicOnly(op));
        }
        if delay_minutes == 0 {
            return Err(OperationError::InvalidArgument(
                "delay must be a positive number of minutes".to_string(),
            ));
        }
        let total_ms = delay_minutes
            .checked_mul(MINUTE_MS)
            .ok_or_else(|| OperationError::InvalidArgument("delay is too large".to_string()))?;

        let token = CancellationToken::new();
        let snapshot = {
            let mut state = self.inner.state.lock().await;
            if state.info.is_active() {
                return Err(OperationError::AlreadyActive(op));
            }
            let info = &mut state.info;
            info.status = OperationStatus::Scheduled;
            info.total_delay_ms = total_ms;
            info.remaining_time_ms = total_ms;
            info.execution_time = self.execution_time(delay_minutes);
            info.scheduled_by = Some(user.to_string());
            let snapshot = info.clone();
            state.countdown = Some(token.clone());
            snapshot
        };

        info!(operation = %op, %user, delay_minutes, "Operation scheduled");
        self.inner
            .ctx
            .emitter
            .emit(AppEvent::operation_scheduled(&snapshot));
        tokio::spawn(self.clone().run_countdown(token));
        self.announce_countdown(delay_minutes).await;
        Ok(snapshot)
    }

    /// Register a cron schedule that triggers the target operation.
    pub async fn schedule_periodic(
        &self,
        user: &str,
        cron_expression: &str,
        timezone: &str,
    ) -> Result<OperationInfo, OperationError> {
        let op = self.operation_type;
        let Some(target) = op.definition().target.filter(|_| op.definition().is_periodic) else {
            return Err(OperationError::NotPeriodic(op));
        };
        validate_cron(cron_expression).map_err(|e| match e {
            SettingsError::InvalidCron { expr, reason } => {
                OperationError::InvalidCron { expr, reason }
            }
            other => OperationError::InvalidCron {
                expr: cron_expression.to_string(),
                reason: other.to_string(),
            },
        })?;
        let tz: chrono_tz::Tz = timezone
            .parse()
            .map_err(|_| OperationError::InvalidTimezone(timezone.to_string()))?;

        let mut state = self.inner.state.lock().await;
        if state.info.is_active() {
            return Err(OperationError::AlreadyActive(op));
        }

        let triggers = self.inner.triggers.clone();
        let trigger = PeriodicTrigger { source: op, target };
        let job = Job::new_async_tz(cron_expression, tz, move |_uuid, _lock| {
            let triggers = triggers.clone();
            Box::pin(async move {
                debug!(source = %trigger.source, target = %trigger.target, "Cron fired");
                if triggers.send(trigger).is_err() {
                    warn!(source = %trigger.source, "Operation manager gone, dropping trigger");
                }
            })
        })
        .map_err(|e| OperationError::InvalidCron {
            expr: cron_expression.to_string(),
            reason: e.to_string(),
        })?;

        let cron = JobScheduler::new()
            .await
            .map_err(|e| OperationError::Scheduler(e.to_string()))?;
        cron.add(job)
            .await
            .map_err(|e| OperationError::Scheduler(e.to_string()))?;
        cron.start()
            .await
            .map_err(|e| OperationError::Scheduler(e.to_string()))?;

        let info = &mut state.info;
        info.status = OperationStatus::Scheduled;
        info.cron_expression = Some(cron_expression.to_string());
        info.timezone = Some(timezone.to_string());
        info.scheduled_by = Some(user.to_string());
        let snapshot = info.clone();
        state.cron = Some(cron);
        drop(state);

        info!(operation = %op, cron = cron_expression, timezone, "Periodic operation registered");
        self.inner
            .ctx
            .emitter
            .emit(AppEvent::operation_scheduled(&snapshot));
        Ok(snapshot)
    }

    /// Cancel a scheduled operation.
    ///
    /// Returns `false` if nothing was scheduled. A running effect cannot be
    /// cancelled.
    pub async fn stop(&self, user: &str) -> Result<bool, OperationError> {
        let op = self.operation_type;
        let (snapshot, cron) = {
            let mut state = self.inner.state.lock().await;
            match state.info.status {
                OperationStatus::Scheduled => {}
                OperationStatus::Running => return Err(OperationError::Executing(op)),
                _ => return Ok(false),
            }
            if let Some(token) = state.countdown.take() {
                token.cancel();
            }
            let cron = state.cron.take();
            state.info.status = OperationStatus::Cancelled;
            let snapshot = state.info.clone();
            state.info.reset();
            (snapshot, cron)
        };

        if let Some(mut cron) = cron {
            if let Err(e) = cron.shutdown().await {
                warn!(operation = %op, error = %e, "Cron scheduler did not shut down cleanly");
            }
        }

        info!(operation = %op, %user, "Operation cancelled");
        self.inner
            .ctx
            .emitter
            .emit(AppEvent::operation_finished(&snapshot));

        if !snapshot.is_background {
            let message = if snapshot.is_restart {
                "Scheduled restart cancelled"
            } else {
                "Scheduled shutdown cancelled"
            };
            self.announce(message).await;
        }
        Ok(true)
    }

    fn execution_time(&self, delay_minutes: u64) -> Option<chrono::DateTime<Utc>> {
        let ms = self
            .inner
            .tick_interval
            .as_millis()
            .saturating_mul(u128::from(delay_minutes));
        let delta = TimeDelta::try_milliseconds(i64::try_from(ms).ok()?)?;
        Utc::now().checked_add_signed(delta)
    }

    async fn run_countdown(self, token: CancellationToken) {
        let tick = self.inner.tick_interval;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let snapshot = {
                let mut state = self.inner.state.lock().await;
                if token.is_cancelled() || state.info.status != OperationStatus::Scheduled {
                    return;
                }
                let info = &mut state.info;
                info.remaining_time_ms = info.remaining_time_ms.saturating_sub(MINUTE_MS);
                if info.remaining_time_ms == 0 {
                    info.status = OperationStatus::Running;
                }
                let snapshot = info.clone();
                if snapshot.status == OperationStatus::Running {
                    state.countdown = None;
                }
                snapshot
            };

            debug!(
                operation = %self.operation_type,
                remaining_ms = snapshot.remaining_time_ms,
                "Countdown tick"
            );
            self.inner
                .ctx
                .emitter
                .emit(AppEvent::operation_progress(&snapshot));
            self.announce_countdown(snapshot.remaining_minutes()).await;

            if snapshot.status == OperationStatus::Running {
                break;
            }
        }

        self.execute().await;
    }

    async fn execute(&self) {
        let op = self.operation_type;
        let timeout = Duration::from_millis(self.inner.state.lock().await.info.timeout_ms);
        info!(operation = %op, timeout_secs = timeout.as_secs(), "Executing operation");

        let control = &self.inner.ctx.control;
        let result = match op {
            OperationType::Restart | OperationType::PeriodicRestart => control
                .restart_server(timeout)
                .await
                .map_err(|e| e.to_string()),
            OperationType::Stop => match tokio::time::timeout(timeout, control.stop_server()).await
            {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!(
                    "Server did not stop within {}s",
                    timeout.as_secs()
                )),
            },
        };

        let snapshot = {
            let mut state = self.inner.state.lock().await;
            state.info.status = if result.is_ok() {
                OperationStatus::Completed
            } else {
                OperationStatus::Failed
            };
            state.info.clone()
        };

        let emitter = &self.inner.ctx.emitter;
        match result {
            Ok(()) => info!(operation = %op, "Operation completed"),
            Err(ref e) => {
                error!(operation = %op, error = %e, "Operation failed");
                emitter.emit(AppEvent::operation_error(&snapshot, e.clone()));
            }
        }
        emitter.emit(AppEvent::operation_finished(&snapshot));

        self.inner.state.lock().await.info.reset();
    }

    async fn announce_countdown(&self, minutes: u64) {
        let announcer = &self.inner.ctx.announcer;
        let result = if self.operation_type.definition().is_restart {
            announcer.send_restart_announce(minutes).await
        } else {
            let message = match minutes {
                0 => "Server is shutting down now".to_string(),
                1 => "Server shutdown in 1 minute".to_string(),
                n => format!("Server shutdown in {n} minutes"),
            };
            announcer.send_announce(&message).await
        };
        if let Err(e) = result {
            warn!(operation = %self.operation_type, error = %e, "Announcement failed");
        }
    }

    async fn announce(&self, message: &str) {
        if let Err(e) = self.inner.ctx.announcer.send_announce(message).await {
            warn!(operation = %self.operation_type, error = %e, "Announcement failed");
        }
    }
}
