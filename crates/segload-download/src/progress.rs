//! Progress aggregation.
//!
//! All per-range updates for one download funnel into a single
//! aggregator task that owns the chunk map and the attempt's start
//! time. This serialization is what makes concurrent range updates safe
//! without per-field locks: streamers only send messages, and snapshots
//! are recomputed and published from one place.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use segload_core::download::{ChunkState, DownloadEvent, DownloadId, DownloadStatus, ProgressSnapshot};
use segload_core::ports::DownloadEventEmitterPort;

/// A message to the aggregator task.
#[derive(Debug, Clone)]
pub enum ProgressMsg {
    /// Updated state of one chunk (segmented mode).
    Chunk(ChunkState),
    /// Updated byte count of the single continuous stream.
    Stream {
        /// Bytes received so far.
        received: u64,
    },
    /// Explicit lifecycle override from the coordinator (e.g. merging).
    Status(DownloadStatus),
}

/// Rate-limiter for snapshot publication.
///
/// The aggregator recomputes a snapshot on every incoming message but
/// only publishes when at least the configured interval has passed
/// since the last one (status changes and the closing snapshot bypass
/// the throttle). The interval comes from `EngineConfig`.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Whether enough time has passed to publish again. The first call
    /// always passes.
    pub fn should_emit(&mut self) -> bool {
        let now = Instant::now();
        if self
            .last_emit
            .is_some_and(|last| now.duration_since(last) < self.min_interval)
        {
            return false;
        }
        self.last_emit = Some(now);
        true
    }
}

/// Spawn the aggregator task for one download attempt.
///
/// Returns the sender streamers push updates through and the task
/// handle. The task exits once every sender is dropped, publishing one
/// final unthrottled snapshot on the way out.
pub(crate) fn spawn_aggregator(
    id: DownloadId,
    total: Option<u64>,
    seed: Vec<ChunkState>,
    emitter: Arc<dyn DownloadEventEmitterPort>,
    min_interval: Duration,
) -> (mpsc::UnboundedSender<ProgressMsg>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressMsg>();

    let handle = tokio::spawn(async move {
        let started = Instant::now();
        let mut chunks: BTreeMap<u32, ChunkState> =
            seed.into_iter().map(|c| (c.index, c)).collect();
        let mut single_received = 0u64;
        let mut status_override: Option<DownloadStatus> = None;
        let mut throttle = ProgressThrottle::new(min_interval);

        while let Some(msg) = rx.recv().await {
            let force = match msg {
                ProgressMsg::Chunk(chunk) => {
                    chunks.insert(chunk.index, chunk);
                    false
                }
                ProgressMsg::Stream { received } => {
                    single_received = received;
                    false
                }
                ProgressMsg::Status(status) => {
                    status_override = Some(status);
                    true
                }
            };

            if force || throttle.should_emit() {
                let snapshot = compute_snapshot(
                    &id,
                    status_override,
                    &chunks,
                    single_received,
                    total,
                    started.elapsed().as_secs_f64(),
                );
                emitter.emit(DownloadEvent::Progress { snapshot });
            }
        }

        // All senders gone: publish the closing snapshot unconditionally.
        let snapshot = compute_snapshot(
            &id,
            status_override,
            &chunks,
            single_received,
            total,
            started.elapsed().as_secs_f64(),
        );
        emitter.emit(DownloadEvent::Progress { snapshot });
    });

    (tx, handle)
}

/// Recompute a coherent snapshot from the aggregator's owned state.
fn compute_snapshot(
    id: &DownloadId,
    status_override: Option<DownloadStatus>,
    chunks: &BTreeMap<u32, ChunkState>,
    single_received: u64,
    total: Option<u64>,
    elapsed_secs: f64,
) -> ProgressSnapshot {
    let (received, total, chunk_list) = if chunks.is_empty() {
        (single_received, total, Vec::new())
    } else {
        let received = chunks.values().map(|c| c.received).sum();
        let expected = chunks.values().map(ChunkState::expected_len).sum();
        (received, Some(expected), chunks.values().cloned().collect())
    };

    #[allow(clippy::cast_precision_loss)]
    let fraction = match total {
        Some(t) if t > 0 => (received as f64 / t as f64).min(1.0),
        _ => 0.0,
    };

    #[allow(clippy::cast_precision_loss)]
    let speed_bps = if elapsed_secs > 0.0 {
        received as f64 / elapsed_secs
    } else {
        0.0
    };

    let status = status_override.unwrap_or(if total.is_some() && fraction >= 1.0 {
        DownloadStatus::Completed
    } else {
        DownloadStatus::Downloading
    });

    ProgressSnapshot {
        id: id.clone(),
        fraction,
        status,
        received,
        total,
        speed_bps,
        chunks: chunk_list,
    }
}
