//! Server state aggregator.
//!
//! Single authoritative projection of [`ServerDomainState`]. Every log event
//! that carries server fields is merged in and published; process stop
//! resets the projection.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};
use vigil_core::{AppEvent, AppEventEmitter, LogEvent, ServerDomainState};

pub struct ServerStateAggregator {
    state: ServerDomainState,
    ready_emitted: bool,
    ready: watch::Sender<bool>,
    emitter: Arc<dyn AppEventEmitter>,
}

impl ServerStateAggregator {
    pub fn new(emitter: Arc<dyn AppEventEmitter>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            state: ServerDomainState::default(),
            ready_emitted: false,
            ready,
            emitter,
        }
    }

    pub const fn state(&self) -> &ServerDomainState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Observe readiness. Flips to `true` on setup completion and back to
    /// `false` on reset.
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Apply one log event.
    ///
    /// Player events are ignored. Returns `true` if the event was a server
    /// event.
    pub fn apply(&mut self, event: &LogEvent) -> bool {
        let Some(patch) = event.server_patch() else {
            return false;
        };

        let changed = self.state.merge(&patch);
        debug!(kind = event.kind(), changed, "Applied server event");
        self.emitter.emit(AppEvent::server_info(&self.state));

        if self.state.server_setup_complete && !self.ready_emitted {
            self.ready_emitted = true;
            info!(version = ?self.state.version, "Server is ready");
            self.emitter.emit(AppEvent::ready(&self.state));
            self.ready.send_replace(true);
        }
        true
    }

    /// Start a fresh process lifetime with default state.
    pub fn reset(&mut self) {
        self.state.reset();
        self.ready_emitted = false;
        self.ready.send_replace(false);
    }

    /// Process exited: reset and publish `server_stopped`.
    pub fn stop(&mut self, exit_code: Option<i32>) {
        self.reset();
        self.emitter.emit(AppEvent::server_stopped(exit_code));
    }
}
