//! Byte-range partitioning.
//!
//! Pure computation: given a known total length and a requested segment
//! count, produce contiguous, non-overlapping chunks that together span
//! exactly `[0, total_bytes)`.

use segload_core::download::{ChunkState, DownloadId, MAX_SEGMENTS};

use crate::engine::paths::chunk_file_name;

/// Compute the chunk plan for a download of `total_bytes` bytes.
///
/// The segment count is clamped to `[1, MAX_SEGMENTS]` and further
/// capped so it never exceeds `total_bytes` (no sub-byte ranges).
/// `total_bytes / segments` leaves a remainder of
/// `total_bytes % segments` bytes, distributed as one extra byte to
/// each of the first `remainder` chunks, so coverage is exact and no
/// byte is double-counted.
///
/// `total_bytes` must be at least 1; the engine routes empty resources
/// through the single-stream path.
pub fn plan_chunks(id: &DownloadId, total_bytes: u64, requested_segments: u32) -> Vec<ChunkState> {
    debug_assert!(total_bytes >= 1, "planner requires a non-empty resource");
    if total_bytes == 0 {
        return Vec::new();
    }

    let segments = u64::from(requested_segments.clamp(1, MAX_SEGMENTS)).min(total_bytes);
    let base = total_bytes / segments;
    let remainder = total_bytes % segments;

    let mut chunks = Vec::with_capacity(usize::try_from(segments).unwrap_or(1));
    let mut lower = 0u64;
    for index in 0..segments {
        let len = if index < remainder { base + 1 } else { base };
        let upper = lower + len - 1;
        #[allow(clippy::cast_possible_truncation)]
        let index = index as u32;
        chunks.push(ChunkState::new(
            index,
            lower,
            upper,
            chunk_file_name(id, index),
        ));
        lower = upper + 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> DownloadId {
        DownloadId::new("dl")
    }

    fn assert_covers(chunks: &[ChunkState], total: u64) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].lower, 0);
        assert_eq!(chunks[chunks.len() - 1].upper, total - 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].lower, pair[0].upper + 1, "gap or overlap");
        }
        let sum: u64 = chunks.iter().map(ChunkState::expected_len).sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn million_bytes_four_segments() {
        let chunks = plan_chunks(&id(), 1_000_000, 4);
        let bounds: Vec<(u64, u64)> = chunks.iter().map(|c| (c.lower, c.upper)).collect();
        assert_eq!(
            bounds,
            vec![
                (0, 249_999),
                (250_000, 499_999),
                (500_000, 749_999),
                (750_000, 999_999)
            ]
        );
        assert_covers(&chunks, 1_000_000);
    }

    #[test]
    fn remainder_spread_over_leading_chunks() {
        let chunks = plan_chunks(&id(), 10, 3);
        // 10 / 3 = 3 rem 1: first chunk gets the extra byte
        assert_eq!(chunks[0].expected_len(), 4);
        assert_eq!(chunks[1].expected_len(), 3);
        assert_eq!(chunks[2].expected_len(), 3);
        assert_covers(&chunks, 10);
    }

    #[test]
    fn segment_count_clamped_to_eight() {
        let chunks = plan_chunks(&id(), 1_000, 99);
        assert_eq!(chunks.len(), 8);
        assert_covers(&chunks, 1_000);
    }

    #[test]
    fn segment_count_clamped_to_one() {
        let chunks = plan_chunks(&id(), 1_000, 0);
        assert_eq!(chunks.len(), 1);
        assert_covers(&chunks, 1_000);
    }

    #[test]
    fn no_sub_byte_ranges() {
        let chunks = plan_chunks(&id(), 3, 8);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(chunk.expected_len(), 1);
        }
        assert_covers(&chunks, 3);
    }

    #[test]
    fn single_byte_resource() {
        let chunks = plan_chunks(&id(), 1, 4);
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].lower, chunks[0].upper), (0, 0));
    }

    #[test]
    fn coverage_property_over_grid() {
        for total in [1u64, 2, 7, 8, 9, 63, 64, 65, 1_000, 65_537] {
            for segments in 1..=10u32 {
                let chunks = plan_chunks(&id(), total, segments);
                assert!(chunks.len() as u64 <= u64::from(segments.clamp(1, 8)).min(total));
                assert_covers(&chunks, total);
            }
        }
    }

    #[test]
    fn chunk_file_names_follow_index() {
        let chunks = plan_chunks(&id(), 100, 2);
        assert_eq!(chunks[0].file_name, "dl-chunk-0");
        assert_eq!(chunks[1].file_name, "dl-chunk-1");
    }
}
