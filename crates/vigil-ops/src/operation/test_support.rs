//! Hand-written fakes for operation tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vigil_core::{
    AnnouncerPort, AppEvent, AppEventEmitter, OperationInfo, ProcessError, RconError,
    ServerControlPort,
};

#[derive(Clone, Default)]
pub struct RecordingEmitter(Arc<Mutex<Vec<AppEvent>>>);

impl RecordingEmitter {
    pub fn names(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(AppEvent::event_name).collect()
    }

    /// Operation carried by the most recent operation event.
    pub fn last_operation(&self) -> Option<OperationInfo> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|event| match event {
                AppEvent::OperationScheduled { operation }
                | AppEvent::OperationProgress { operation }
                | AppEvent::OperationFinished { operation }
                | AppEvent::OperationError { operation, .. } => Some(operation.clone()),
                _ => None,
            })
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.0.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

#[derive(Default)]
pub struct FakeAnnouncer(Mutex<Vec<String>>);

impl FakeAnnouncer {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnnouncerPort for FakeAnnouncer {
    async fn send_announce(&self, message: &str) -> Result<(), RconError> {
        self.0.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Server control that records calls, optionally failing or taking time.
#[derive(Default)]
pub struct FakeControl {
    calls: Mutex<Vec<&'static str>>,
    fail: bool,
    delay: Option<Duration>,
}

impl FakeControl {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, call: &'static str) -> Result<(), ProcessError> {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            Err(ProcessError::ReadyTimeout(600))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ServerControlPort for FakeControl {
    async fn stop_server(&self) -> Result<(), ProcessError> {
        self.run("stop").await
    }

    async fn restart_server(&self, _timeout: Duration) -> Result<(), ProcessError> {
        self.run("restart").await
    }
}
