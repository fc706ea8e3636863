//! Segmented download engine.
//!
//! Fetches a remote resource over HTTP by splitting the transfer into
//! independently streamed byte ranges, reassembles the ranges into one
//! file, and falls back to a single continuous stream when the server
//! does not support range requests or the segmented path fails.
//!
//! # Architecture
//!
//! - `probe` - determines range support and total length
//! - `planner` - pure byte-range partitioning
//! - `streamer` - one concurrent streamer per range, resumable
//! - `fallback` - sequential whole-body transfer
//! - `progress` - single-owner aggregation task per download
//! - `merge` - ordered, atomic assembly of the destination file
//! - `engine` - coordinator and lifecycle registry (enqueue/pause/resume)

// Re-export core types for convenience
pub use segload_core::download::{
    CapabilityInfo, ChunkState, DownloadError, DownloadEvent, DownloadId, DownloadRequest,
    DownloadStatus, ProgressSnapshot,
};
pub use segload_core::ports::{DownloadEventEmitterPort, NoopDownloadEmitter};

pub mod fallback;
pub mod merge;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod streamer;

mod engine;

pub use engine::{DownloadEngine, DownloadScratch, EngineConfig};
pub use progress::ProgressThrottle;
