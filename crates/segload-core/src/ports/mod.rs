//! Port definitions: the seams through which the engine talks to the
//! outside world.

mod event_emitter;

pub use event_emitter::{DownloadEventEmitterPort, NoopDownloadEmitter};
