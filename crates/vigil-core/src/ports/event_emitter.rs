//! Event emitter trait for cross-crate event broadcasting.
//!
//! Implementations handle transport details (broadcast channels, stdout,
//! websockets).

use crate::events::AppEvent;

/// Trait for emitting outbound events.
///
/// Keeps channel types out of the public API of the runtime and operation
/// crates.
pub trait AppEventEmitter: Send + Sync {
    /// Emit an event. Must not block.
    fn emit(&self, event: AppEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn AppEventEmitter>;
}

/// Emitter that discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {}

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn AppEventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(AppEvent::server_started(Some(1)));
        let _boxed: Box<dyn AppEventEmitter> = emitter.clone_box();
    }
}
