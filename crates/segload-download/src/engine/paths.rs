//! Scratch path planning for downloads.
//!
//! Each download owns one scratch directory under the engine's
//! configured scratch root, holding one file per range
//! (`<id>-chunk-<index>`) or one file for single-stream mode
//! (`<id>-single`). Scratch files survive a pause so a later resume
//! can append to them.

use std::path::{Path, PathBuf};

use segload_core::download::{ChunkState, DownloadError, DownloadId, DownloadResult};

/// Replace path separators and other unsafe characters so an opaque
/// download id can be used as a directory and file name stem.
pub(crate) fn sanitize_id(id: &DownloadId) -> String {
    id.as_str()
        .replace(['/', '\\', ':', '?', '*', '"', '<', '>', '|'], "_")
}

/// Scratch file name for one chunk: `<id>-chunk-<index>`.
pub(crate) fn chunk_file_name(id: &DownloadId, index: u32) -> String {
    format!("{}-chunk-{index}", sanitize_id(id))
}

/// The planned scratch layout for one download.
#[derive(Debug, Clone)]
pub struct DownloadScratch {
    /// Directory holding this download's scratch files.
    pub dir: PathBuf,
}

impl DownloadScratch {
    /// Plan the scratch directory for a download.
    pub fn plan(scratch_root: &Path, id: &DownloadId) -> Self {
        Self {
            dir: scratch_root.join(sanitize_id(id)),
        }
    }

    /// Ensure the scratch directory exists, creating it if necessary.
    pub fn ensure_dir(&self) -> DownloadResult<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)
                .map_err(|e| DownloadError::io("create_dir", e.to_string()))?;
        }
        Ok(())
    }

    /// Full path of a chunk's scratch file.
    pub fn chunk_path(&self, chunk: &ChunkState) -> PathBuf {
        self.dir.join(&chunk.file_name)
    }

    /// Full path of the single-stream scratch file.
    pub fn single_path(&self, id: &DownloadId) -> PathBuf {
        self.dir.join(format!("{}-single", sanitize_id(id)))
    }

    /// Best-effort removal of the whole scratch directory.
    ///
    /// Called after a successful finalize; failures are logged and
    /// otherwise ignored, a stale scratch dir is harmless.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::debug!(dir = %self.dir.display(), error = %e, "Scratch cleanup skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_joins_sanitized_id() {
        let id = DownloadId::new("job/42:a");
        let scratch = DownloadScratch::plan(Path::new("/tmp/segload"), &id);
        assert_eq!(scratch.dir, PathBuf::from("/tmp/segload/job_42_a"));
    }

    #[test]
    fn chunk_file_names_embed_index() {
        let id = DownloadId::new("dl-1");
        assert_eq!(chunk_file_name(&id, 0), "dl-1-chunk-0");
        assert_eq!(chunk_file_name(&id, 7), "dl-1-chunk-7");
    }

    #[test]
    fn chunk_path_uses_chunk_file_name() {
        let id = DownloadId::new("dl-1");
        let scratch = DownloadScratch::plan(Path::new("/scratch"), &id);
        let chunk = ChunkState::new(3, 0, 9, chunk_file_name(&id, 3));
        assert_eq!(
            scratch.chunk_path(&chunk),
            PathBuf::from("/scratch/dl-1/dl-1-chunk-3")
        );
    }

    #[test]
    fn single_path_has_suffix() {
        let id = DownloadId::new("dl-1");
        let scratch = DownloadScratch::plan(Path::new("/scratch"), &id);
        assert_eq!(
            scratch.single_path(&id),
            PathBuf::from("/scratch/dl-1/dl-1-single")
        );
    }
}
