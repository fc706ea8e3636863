//! Download domain types, events, and errors.
//!
//! This module contains pure data types for the segmented download
//! system. No I/O, networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Core identifiers and data structures (`DownloadId`, `ChunkState`, `CapabilityInfo`)
//! - `events` - Progress snapshots, lifecycle status, and the event union
//! - `errors` - Error types for download operations

pub mod errors;
pub mod events;
pub mod types;

// Re-export commonly used types
pub use errors::{DownloadError, DownloadResult};
pub use events::{DownloadEvent, DownloadStatus, ProgressSnapshot};
pub use types::{
    CapabilityInfo, ChunkState, DEFAULT_SEGMENTS, DownloadId, DownloadRequest, MAX_SEGMENTS,
};
