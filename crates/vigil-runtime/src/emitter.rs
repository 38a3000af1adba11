//! Broadcast-channel event emitter.
//!
//! Fans [`AppEvent`]s out to any number of subscribers (the CLI printer,
//! integration tests, a future web surface).

use tokio::sync::broadcast;
use tracing::debug;
use vigil_core::{AppEvent, AppEventEmitter};

/// Broadcast channel capacity for outbound events
const CHANNEL_CAPACITY: usize = 256;

/// Emitter backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastEmitter {
    sender: broadcast::Sender<AppEvent>,
}

impl BroadcastEmitter {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventEmitter for BroadcastEmitter {
    fn emit(&self, event: AppEvent) {
        // Nobody listening is not an error
        if self.sender.receiver_count() > 0 {
            debug!(event = event.event_name(), "Broadcasting event");
            let _ = self.sender.send(event);
        }
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
