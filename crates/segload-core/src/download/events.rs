//! Download events - progress snapshots, lifecycle status, and the
//! discriminated union pushed through the event emitter port.

use super::types::{ChunkState, DownloadId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a download.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Accepted but not yet transferring.
    Queued,
    /// Actively transferring bytes.
    Downloading,
    /// Paused by explicit cancellation; scratch files kept for resume.
    Paused,
    /// All ranges received; assembling the destination file.
    Merging,
    /// Completed successfully.
    Completed,
    /// Failed terminally.
    Failed,
}

impl DownloadStatus {
    /// Convert to string representation for external storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Merging => "merging",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "paused" => Self::Paused,
            "merging" => Self::Merging,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            // "queued" or unknown values default to Queued
            _ => Self::Queued,
        }
    }

    /// Whether this is a terminal state for one attempt.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A coherent point-in-time view of one download's progress.
///
/// Recomputed on every aggregation event and never persisted by the
/// engine; consumers that want history must record it themselves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Identifier of the download this snapshot describes.
    pub id: DownloadId,
    /// Overall fractional progress in `[0, 1]`; 0 when total is unknown.
    pub fraction: f64,
    /// Lifecycle status at snapshot time.
    pub status: DownloadStatus,
    /// Total bytes received across all ranges.
    pub received: u64,
    /// Total bytes expected, when known.
    pub total: Option<u64>,
    /// Instantaneous speed in bytes per second since the attempt started.
    pub speed_bps: f64,
    /// Per-range detail in ascending index order; empty in single-stream mode.
    pub chunks: Vec<ChunkState>,
}

/// Single discriminated union for all download events.
///
/// Serialized with a `type` tag so UI layers can consume it as a
/// discriminated union.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A download attempt has started transferring.
    Started {
        /// Identifier of the download.
        id: DownloadId,
    },

    /// Progress update (pushed many times per attempt).
    Progress {
        /// The recomputed snapshot.
        snapshot: ProgressSnapshot,
    },

    /// Download completed; the destination file is in place.
    Completed {
        /// Identifier of the download.
        id: DownloadId,
        /// Final destination path.
        path: std::path::PathBuf,
    },

    /// Download failed terminally.
    ///
    /// Cancellation (pause) is never reported through this variant;
    /// it is a silent transition decided by the caller.
    Failed {
        /// Identifier of the download.
        id: DownloadId,
        /// Human-readable error description.
        error: String,
    },
}

impl DownloadEvent {
    /// The download this event refers to.
    #[must_use]
    pub const fn id(&self) -> &DownloadId {
        match self {
            Self::Started { id } | Self::Completed { id, .. } | Self::Failed { id, .. } => id,
            Self::Progress { snapshot } => &snapshot.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_strings() {
        for status in [
            DownloadStatus::Queued,
            DownloadStatus::Downloading,
            DownloadStatus::Paused,
            DownloadStatus::Merging,
            DownloadStatus::Completed,
            DownloadStatus::Failed,
        ] {
            assert_eq!(DownloadStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_defaults_to_queued() {
        assert_eq!(DownloadStatus::parse("garbage"), DownloadStatus::Queued);
    }

    #[test]
    fn terminal_states() {
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(!DownloadStatus::Paused.is_terminal());
        assert!(!DownloadStatus::Merging.is_terminal());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = DownloadEvent::Started {
            id: DownloadId::new("dl-1"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"started""#));
        assert!(json.contains(r#""id":"dl-1""#));
    }

    #[test]
    fn event_id_extraction() {
        let event = DownloadEvent::Failed {
            id: DownloadId::new("dl-2"),
            error: "boom".to_string(),
        };
        assert_eq!(event.id().as_str(), "dl-2");
    }
}
