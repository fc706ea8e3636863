//! Core domain types and port definitions for segload.
//!
//! This crate contains pure data types, events, errors, and the port
//! traits through which the download engine talks to the outside world.
//! No I/O, networking, or runtime dependencies allowed.

pub mod download;
pub mod ports;

// Re-export commonly used types
pub use download::{
    CapabilityInfo, ChunkState, DownloadError, DownloadEvent, DownloadId, DownloadRequest,
    DownloadResult, DownloadStatus, ProgressSnapshot,
};
pub use ports::DownloadEventEmitterPort;
