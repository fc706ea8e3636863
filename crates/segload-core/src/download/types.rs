//! Core domain types for segmented downloads.
//!
//! Pure data types with no I/O dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of byte-range segments for a new download.
pub const DEFAULT_SEGMENTS: u32 = 4;

/// Maximum number of byte-range segments for a single download.
pub const MAX_SEGMENTS: u32 = 8;

/// Canonical identifier for a download.
///
/// Opaque to the engine: the caller chooses the value and the engine
/// only requires it to be unique among in-flight downloads. It is also
/// used to derive scratch file names, so it is sanitized at that
/// boundary rather than here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    /// Create a new download ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DownloadId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for DownloadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// State of one byte range within a segmented download.
///
/// The index defines merge order. `lower` and `upper` are inclusive
/// byte offsets into the remote resource; `received` counts the bytes
/// already written to the chunk's scratch file. Mutated only by the
/// range streamer that owns it while the streamer runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkState {
    /// 0-based chunk index; ascending index order is merge order.
    pub index: u32,
    /// Inclusive lower byte offset into the remote resource.
    pub lower: u64,
    /// Inclusive upper byte offset into the remote resource.
    pub upper: u64,
    /// Bytes already received and flushed for this chunk.
    pub received: u64,
    /// Name of the chunk's scratch file within the download's scratch dir.
    pub file_name: String,
}

impl ChunkState {
    /// Create a fresh chunk covering `[lower, upper]` with nothing received.
    pub fn new(index: u32, lower: u64, upper: u64, file_name: impl Into<String>) -> Self {
        Self {
            index,
            lower,
            upper,
            received: 0,
            file_name: file_name.into(),
        }
    }

    /// Expected total length of this chunk in bytes.
    #[must_use]
    pub const fn expected_len(&self) -> u64 {
        self.upper - self.lower + 1
    }

    /// Bytes still missing from this chunk.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.expected_len().saturating_sub(self.received)
    }

    /// Whether every byte of this chunk has been received.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.received >= self.expected_len()
    }
}

/// What the capability probe learned about a remote resource.
///
/// Produced once per attempt; immutable afterward. Absence of
/// information is a valid result and forces the single-stream path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    /// Total byte length of the resource, when the server reported one.
    pub total_bytes: Option<u64>,
    /// Whether the server accepts `Range` requests.
    pub supports_ranges: bool,
}

impl CapabilityInfo {
    /// Whether the segmented pipeline can be used at all.
    ///
    /// Requires range support and a known, non-zero total length.
    #[must_use]
    pub fn segmentable(&self) -> bool {
        self.supports_ranges && self.total_bytes.is_some_and(|total| total > 0)
    }
}

/// A request to download one resource.
///
/// Supplied by the external caller; immutable for the duration of one
/// attempt. A non-empty `existing_plan` marks this as a resume: the
/// planner is bypassed and the carried chunk states (including their
/// `received` counts) are reused unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Unique identifier for this download.
    pub id: DownloadId,
    /// Source URL.
    pub url: String,
    /// Destination file path for the merged artifact.
    pub destination: PathBuf,
    /// Requested segment count; clamped to `[1, MAX_SEGMENTS]` by the engine.
    pub requested_segments: u32,
    /// Chunk states recorded from a prior paused attempt, if resuming.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub existing_plan: Vec<ChunkState>,
}

impl DownloadRequest {
    /// Create a request with the default segment count and no prior plan.
    pub fn new(id: impl Into<DownloadId>, url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            destination: destination.into(),
            requested_segments: DEFAULT_SEGMENTS,
            existing_plan: Vec::new(),
        }
    }

    /// Set the requested segment count.
    #[must_use]
    pub const fn with_segments(mut self, segments: u32) -> Self {
        self.requested_segments = segments;
        self
    }

    /// Attach a previously recorded chunk plan (marks this as a resume).
    #[must_use]
    pub fn with_plan(mut self, plan: Vec<ChunkState>) -> Self {
        self.existing_plan = plan;
        self
    }

    /// Requested segment count clamped to the supported range.
    #[must_use]
    pub const fn clamped_segments(&self) -> u32 {
        if self.requested_segments < 1 {
            1
        } else if self.requested_segments > MAX_SEGMENTS {
            MAX_SEGMENTS
        } else {
            self.requested_segments
        }
    }

    /// Whether this request carries a prior plan to resume from.
    #[must_use]
    pub fn is_resume(&self) -> bool {
        !self.existing_plan.is_empty()
    }
}

impl From<String> for DownloadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
