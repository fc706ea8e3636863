//! Download event emitter port.
//!
//! This port abstracts event emission, allowing the download engine to
//! push progress and completion without coupling to transport details
//! (channels, progress bars, IPC).

use crate::download::DownloadEvent;

/// Port for emitting download events.
///
/// The engine pushes `DownloadEvent::Progress` many times per attempt
/// and exactly one `Completed` or `Failed` per attempt; cancellation
/// produces neither. Implementations handle the actual delivery.
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event.
    ///
    /// Implementations should handle the event asynchronously or buffer
    /// it. This method should not block.
    fn emit(&self, event: DownloadEvent);

    /// Clone this emitter into a boxed trait object.
    ///
    /// This enables cloning of `Arc<dyn DownloadEventEmitterPort>`
    /// without requiring the underlying type to implement `Clone`.
    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort>;
}

/// A no-op event emitter for tests and contexts where progress display
/// is optional.
#[derive(Debug, Clone, Default)]
pub struct NoopDownloadEmitter;

impl NoopDownloadEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownloadEventEmitterPort for NoopDownloadEmitter {
    fn emit(&self, _event: DownloadEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadId;
    use std::sync::Arc;

    #[test]
    fn noop_emitter_discards_events() {
        let emitter = NoopDownloadEmitter::new();
        emitter.emit(DownloadEvent::Started {
            id: DownloadId::new("test"),
        });
    }

    #[test]
    fn noop_emitter_clone_box() {
        let emitter = NoopDownloadEmitter::new();
        let _boxed: Box<dyn DownloadEventEmitterPort> = emitter.clone_box();
    }

    #[test]
    fn arc_emitter_is_usable() {
        let emitter: Arc<dyn DownloadEventEmitterPort> = Arc::new(NoopDownloadEmitter::new());
        emitter.emit(DownloadEvent::Started {
            id: DownloadId::new("test"),
        });
    }
}
