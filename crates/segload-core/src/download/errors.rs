//! Download error types.
//!
//! These errors are designed to be serializable and not depend on
//! external error types like `std::io::Error` or HTTP client errors.
//! For I/O errors, the kind and message are captured as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for download operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// The server answered with a non-success status or no usable body.
    #[error("Invalid response from server (HTTP {status})")]
    InvalidResponse {
        /// HTTP status code of the offending response.
        status: u16,
    },

    /// The server reported no usable content length.
    #[error("Missing or unusable content length")]
    MissingLength,

    /// Network/transport error during a transfer.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
    },

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g. "NotFound", "PermissionDenied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// A range's scratch file could not be read back during merge.
    #[error("Merge failed: {message}")]
    MergeFailed {
        /// Detailed error message.
        message: String,
    },

    /// The server does not support byte ranges.
    ///
    /// Internal signal that forces the single-stream fallback; never
    /// surfaced to the caller.
    #[error("Server does not support byte ranges")]
    RangesUnsupported,

    /// The attempt was cancelled (paused) by the caller.
    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    ///
    /// This captures the error kind name and message for serialization.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    /// Create a merge failure error.
    pub fn merge_failed(message: impl Into<String>) -> Self {
        Self::MergeFailed {
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    #[must_use]
    pub const fn invalid_response(status: u16) -> Self {
        Self::InvalidResponse { status }
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Result alias for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_captures_kind_and_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such chunk");
        let err = DownloadError::from(io);
        match err {
            DownloadError::Io { kind, message } => {
                assert_eq!(kind, "NotFound");
                assert!(message.contains("no such chunk"));
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_is_distinguishable() {
        assert!(DownloadError::Cancelled.is_cancelled());
        assert!(!DownloadError::MissingLength.is_cancelled());
    }

    #[test]
    fn errors_serialize() {
        let err = DownloadError::invalid_response(503);
        let json = serde_json::to_string(&err).unwrap();
        let back: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
