//! Ordered merge and atomic finalize.
//!
//! Concatenates completed range files in ascending index order into a
//! `.partial` sibling of the destination, then renames it into place.
//! The rename is the only externally visible state transition for the
//! destination file; partial merges are never visible at its path.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use segload_core::download::{ChunkState, DownloadError, DownloadResult};

use crate::engine::paths::DownloadScratch;

/// Copy block size used while assembling the destination.
const MERGE_BUF_SIZE: usize = 256 * 1024;

/// The `.partial` sibling used while assembling `dest`.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map_or_else(
        || std::ffi::OsString::from("download"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".partial");
    dest.with_file_name(name)
}

/// Merge completed chunks into `dest`, byte-exact and in index order.
///
/// The chunk list is re-sorted by index, so callers may pass chunks in
/// completion order.
pub async fn merge_chunks(
    scratch: &DownloadScratch,
    chunks: &[ChunkState],
    dest: &Path,
) -> DownloadResult<()> {
    let mut ordered: Vec<&ChunkState> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    let sources: Vec<PathBuf> = ordered.iter().map(|c| scratch.chunk_path(c)).collect();
    assemble(&sources, dest).await
}

/// Finalize a completed single-stream scratch file into `dest`.
pub async fn finalize_single(scratch_file: &Path, dest: &Path) -> DownloadResult<()> {
    let sources = [scratch_file.to_path_buf()];
    assemble(&sources, dest).await
}

/// Concatenate `sources` into `dest` through a `.partial` sibling.
///
/// Any failure leaves `dest` untouched; the sibling is removed on a
/// best-effort basis. On success a pre-existing `dest` is removed and
/// the sibling renamed into place.
async fn assemble(sources: &[PathBuf], dest: &Path) -> DownloadResult<()> {
    let partial = partial_path(dest);

    let result = copy_into(sources, &partial).await;
    if let Err(e) = result {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }

    if fs::try_exists(dest).await.unwrap_or(false) {
        fs::remove_file(dest)
            .await
            .map_err(|e| DownloadError::merge_failed(format!("replace destination: {e}")))?;
    }
    fs::rename(&partial, dest)
        .await
        .map_err(|e| DownloadError::merge_failed(format!("rename into place: {e}")))?;

    tracing::debug!(dest = %dest.display(), parts = sources.len(), "Merge finalized");
    Ok(())
}

async fn copy_into(sources: &[PathBuf], partial: &Path) -> DownloadResult<()> {
    let mut out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(partial)
        .await
        .map_err(|e| DownloadError::merge_failed(format!("create {}: {e}", partial.display())))?;

    let mut buf = vec![0u8; MERGE_BUF_SIZE];
    for source in sources {
        let mut file = File::open(source)
            .await
            .map_err(|e| DownloadError::merge_failed(format!("open {}: {e}", source.display())))?;
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| DownloadError::merge_failed(format!("read {}: {e}", source.display())))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .await
                .map_err(|e| DownloadError::merge_failed(format!("write: {e}")))?;
        }
    }
    out.flush()
        .await
        .map_err(|e| DownloadError::merge_failed(format!("flush: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segload_core::download::DownloadId;
    use tempfile::TempDir;

    fn chunk(index: u32, lower: u64, upper: u64, file_name: &str) -> ChunkState {
        let mut c = ChunkState::new(index, lower, upper, file_name);
        c.received = c.expected_len();
        c
    }

    async fn write_scratch(scratch: &DownloadScratch, name: &str, data: &[u8]) {
        tokio::fs::write(scratch.dir.join(name), data).await.unwrap();
    }

    fn scratch_for(dir: &TempDir) -> DownloadScratch {
        let scratch = DownloadScratch::plan(dir.path(), &DownloadId::new("dl"));
        scratch.ensure_dir().unwrap();
        scratch
    }

    #[tokio::test]
    async fn merges_in_index_order_regardless_of_input_order() {
        let tmp = TempDir::new().unwrap();
        let scratch = scratch_for(&tmp);
        write_scratch(&scratch, "dl-chunk-0", b"hello ").await;
        write_scratch(&scratch, "dl-chunk-1", b"range ").await;
        write_scratch(&scratch, "dl-chunk-2", b"world").await;

        let chunks = vec![
            chunk(2, 12, 16, "dl-chunk-2"),
            chunk(0, 0, 5, "dl-chunk-0"),
            chunk(1, 6, 11, "dl-chunk-1"),
        ];
        let dest = tmp.path().join("out.bin");
        merge_chunks(&scratch, &chunks, &dest).await.unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello range world");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn missing_chunk_file_fails_and_leaves_destination_untouched() {
        let tmp = TempDir::new().unwrap();
        let scratch = scratch_for(&tmp);
        write_scratch(&scratch, "dl-chunk-0", b"aaaa").await;

        let dest = tmp.path().join("out.bin");
        tokio::fs::write(&dest, b"previous contents").await.unwrap();

        let chunks = vec![chunk(0, 0, 3, "dl-chunk-0"), chunk(1, 4, 7, "dl-chunk-1")];
        let err = merge_chunks(&scratch, &chunks, &dest).await.unwrap_err();
        assert!(matches!(err, DownloadError::MergeFailed { .. }));

        assert_eq!(
            tokio::fs::read(&dest).await.unwrap(),
            b"previous contents",
            "failed merge must not touch the destination"
        );
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn replaces_pre_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let scratch = scratch_for(&tmp);
        write_scratch(&scratch, "dl-chunk-0", b"fresh").await;

        let dest = tmp.path().join("out.bin");
        tokio::fs::write(&dest, b"stale").await.unwrap();

        let chunks = vec![chunk(0, 0, 4, "dl-chunk-0")];
        merge_chunks(&scratch, &chunks, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn finalize_single_moves_scratch_into_place() {
        let tmp = TempDir::new().unwrap();
        let scratch = scratch_for(&tmp);
        let single = scratch.dir.join("dl-single");
        tokio::fs::write(&single, b"whole body").await.unwrap();

        let dest = tmp.path().join("out.bin");
        finalize_single(&single, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"whole body");
    }

    #[tokio::test]
    async fn merge_handles_blocks_larger_than_buffer() {
        let tmp = TempDir::new().unwrap();
        let scratch = scratch_for(&tmp);
        let big = vec![0xABu8; MERGE_BUF_SIZE * 2 + 17];
        write_scratch(&scratch, "dl-chunk-0", &big).await;

        let dest = tmp.path().join("out.bin");
        let chunks = vec![chunk(0, 0, big.len() as u64 - 1, "dl-chunk-0")];
        merge_chunks(&scratch, &chunks, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), big);
    }

    #[test]
    fn partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/downloads/file.bin")),
            PathBuf::from("/downloads/file.bin.partial")
        );
    }
}
