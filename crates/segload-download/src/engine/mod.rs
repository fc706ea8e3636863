//! Download coordinator and lifecycle registry.
//!
//! Owns one concurrent work unit per in-flight download and implements
//! enqueue/pause/resume on top of the probe, plan, stream, and merge
//! stages.
//!
//! # Concurrency Model
//!
//! - One spawned attempt task per active download, one child streamer
//!   per range inside it (`JoinSet`, first failure cancels siblings)
//! - Registry entry existence is the sole source of truth for "active"
//! - Lease tokens prevent a stale attempt from removing the entry a
//!   later resume created
//! - Pause cancels the attempt's token and removes the entry
//!   immediately; scratch files stay on disk

pub(crate) mod paths;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use segload_core::download::{
    ChunkState, DownloadError, DownloadEvent, DownloadId, DownloadRequest, DownloadResult,
    DownloadStatus,
};
use segload_core::ports::DownloadEventEmitterPort;

use crate::progress::{self, ProgressMsg};
use crate::{fallback, merge, planner, probe, streamer};

pub use paths::DownloadScratch;

/// Lease ID for tracking active downloads.
///
/// Used to prevent stale registry removal when a download is paused and
/// re-enqueued while the old attempt is still unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LeaseId(u64);

/// Registry entry for an active download.
struct ActiveDownload {
    /// Unique lease for this attempt.
    lease: LeaseId,
    /// Cancellation token for the whole attempt (and, transitively,
    /// every range streamer under it).
    cancel: CancellationToken,
}

/// Configuration for the download engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for per-download scratch directories.
    pub scratch_root: PathBuf,
    /// Minimum interval between published progress snapshots.
    pub progress_interval: Duration,
}

impl EngineConfig {
    /// Create a config with the default progress interval (100ms).
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// The download engine: coordinator plus lifecycle registry.
///
/// Progress and completion are pushed through the
/// `DownloadEventEmitterPort`; the engine itself holds no UI state and
/// persists nothing.
pub struct DownloadEngine {
    /// Shared HTTP client for all probes and transfers.
    ///
    /// Built without overall timeouts: a stalled range blocks until the
    /// transport gives up.
    client: reqwest::Client,
    /// Engine configuration.
    config: EngineConfig,
    /// Event emitter for progress and completion.
    emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Active downloads keyed by identifier.
    active: Mutex<HashMap<DownloadId, ActiveDownload>>,
    /// Counter for generating lease IDs.
    lease_counter: AtomicU64,
}

impl DownloadEngine {
    /// Create a new engine with a default HTTP client.
    pub fn new(config: EngineConfig, emitter: Arc<dyn DownloadEventEmitterPort>) -> Self {
        Self::with_client(reqwest::Client::new(), config, emitter)
    }

    /// Create a new engine with a caller-supplied HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        config: EngineConfig,
        emitter: Arc<dyn DownloadEventEmitterPort>,
    ) -> Self {
        Self {
            client,
            config,
            emitter,
            active: Mutex::new(HashMap::new()),
            lease_counter: AtomicU64::new(0),
        }
    }

    /// Start a download attempt.
    ///
    /// Returns `false` without side effects if an attempt for this
    /// identifier is already active (at most one concurrent attempt per
    /// identifier).
    pub async fn enqueue(self: &Arc<Self>, request: DownloadRequest) -> bool {
        let lease = LeaseId(self.lease_counter.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&request.id) {
                tracing::debug!(id = %request.id, "Enqueue ignored: download already active");
                return false;
            }
            active.insert(
                request.id.clone(),
                ActiveDownload {
                    lease,
                    cancel: cancel.clone(),
                },
            );
        }

        tracing::info!(
            id = %request.id,
            url = %request.url,
            resume = request.is_resume(),
            "Download enqueued"
        );

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_attempt(request, cancel, lease).await;
        });
        true
    }

    /// Pause an active download.
    ///
    /// Cancels the running attempt and removes the registry entry
    /// immediately; on-disk partial range files are left intact for a
    /// later resume. No completion or failure event is emitted.
    /// Returns `false` if the identifier is not active.
    pub async fn pause(&self, id: &DownloadId) -> bool {
        let entry = self.active.lock().await.remove(id);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::info!(id = %id, "Paused download; scratch files kept for resume");
                true
            }
            None => {
                tracing::debug!(id = %id, "Pause ignored: download not active");
                false
            }
        }
    }

    /// Resume a paused download.
    ///
    /// Semantically identical to [`enqueue`](Self::enqueue): resume
    /// fidelity comes from the caller carrying the previously observed
    /// chunk list in `request.existing_plan`.
    pub async fn resume(self: &Arc<Self>, request: DownloadRequest) -> bool {
        self.enqueue(request).await
    }

    /// Whether an attempt for this identifier is currently active.
    pub async fn is_active(&self, id: &DownloadId) -> bool {
        self.active.lock().await.contains_key(id)
    }

    /// Number of currently active downloads.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Remove the registry entry if it still belongs to this attempt.
    async fn remove_if_lease(&self, id: &DownloadId, lease: LeaseId) -> bool {
        let mut active = self.active.lock().await;
        active
            .get(id)
            .is_some_and(|entry| entry.lease == lease)
            .then(|| active.remove(id))
            .is_some()
    }

    /// Run one attempt to completion and emit its outcome.
    ///
    /// Completion events fire exactly once per attempt; cancellation
    /// (pause) emits nothing.
    async fn run_attempt(
        self: Arc<Self>,
        request: DownloadRequest,
        cancel: CancellationToken,
        lease: LeaseId,
    ) {
        let id = request.id.clone();
        self.emitter.emit(DownloadEvent::Started { id: id.clone() });

        match self.run_pipeline(&request, &cancel).await {
            Ok(path) => {
                tracing::info!(id = %id, path = %path.display(), "Download completed");
                self.emitter.emit(DownloadEvent::Completed {
                    id: id.clone(),
                    path,
                });
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(id = %id, "Download attempt cancelled");
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Download failed");
                self.emitter.emit(DownloadEvent::Failed {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
        }

        if !self.remove_if_lease(&id, lease).await {
            tracing::debug!(id = %id, "Stale attempt finished after pause; registry untouched");
        }
    }

    /// Probe, pick a pipeline, and run it, falling back to the single
    /// stream on any non-cancellation segmented failure.
    async fn run_pipeline(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> DownloadResult<PathBuf> {
        let scratch = DownloadScratch::plan(&self.config.scratch_root, &request.id);
        scratch.ensure_dir()?;

        let capability = probe::probe(&self.client, &request.url).await;
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let plan = if request.is_resume() {
            // A carried plan bypasses the planner entirely, received
            // counts included.
            Ok(request.existing_plan.clone())
        } else if capability.segmentable() {
            // segmentable() guarantees a known, non-zero total.
            let total = capability.total_bytes.unwrap_or_default();
            Ok(planner::plan_chunks(
                &request.id,
                total,
                request.clamped_segments(),
            ))
        } else if capability.supports_ranges {
            Err(DownloadError::MissingLength)
        } else {
            Err(DownloadError::RangesUnsupported)
        };

        let segmented = match plan {
            Ok(chunks) => self.run_segmented(request, chunks, &scratch, cancel).await,
            Err(e) => Err(e),
        };

        match segmented {
            Ok(path) => Ok(path),
            Err(e) if e.is_cancelled() => Err(e),
            // Merge failures are terminal: the ranges were all fetched,
            // so re-downloading them sequentially cannot help.
            Err(e @ DownloadError::MergeFailed { .. }) => Err(e),
            Err(e) => {
                let reason = match e {
                    DownloadError::RangesUnsupported => "ranges_unsupported",
                    DownloadError::MissingLength => "length_unknown",
                    _ => "segmented_failed",
                };
                tracing::warn!(
                    id = %request.id,
                    reason,
                    error = %e,
                    "Segmented transfer unavailable; using single stream"
                );
                self.run_single(request, capability.total_bytes, &scratch, cancel)
                    .await
            }
        }
    }

    /// Segmented pipeline: concurrent range streamers, then merge.
    async fn run_segmented(
        &self,
        request: &DownloadRequest,
        chunks: Vec<ChunkState>,
        scratch: &DownloadScratch,
        cancel: &CancellationToken,
    ) -> DownloadResult<PathBuf> {
        let total: u64 = chunks.iter().map(ChunkState::expected_len).sum();
        let (updates, aggregator) = progress::spawn_aggregator(
            request.id.clone(),
            Some(total),
            chunks.clone(),
            Arc::clone(&self.emitter),
            self.config.progress_interval,
        );

        // First failure cancels the siblings through a child token,
        // leaving the parent token untouched so a pause stays
        // distinguishable from a fan-out abort.
        let fanout = cancel.child_token();
        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let client = self.client.clone();
            let url = request.url.clone();
            let dir = scratch.dir.clone();
            let token = fanout.clone();
            let tx = updates.clone();
            tasks.spawn(async move {
                streamer::stream_chunk(&client, &url, chunk, &dir, &token, &tx).await
            });
        }

        let mut completed: Vec<ChunkState> = Vec::new();
        let mut first_error: Option<DownloadError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(chunk)) => completed.push(chunk),
                Ok(Err(e)) => {
                    if first_error.is_none() && !e.is_cancelled() {
                        fanout.cancel();
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        fanout.cancel();
                        first_error = Some(DownloadError::network(format!(
                            "range task aborted: {e}"
                        )));
                    }
                }
            }
        }

        let outcome: DownloadResult<()> = if cancel.is_cancelled() {
            Err(DownloadError::Cancelled)
        } else if let Some(e) = first_error {
            Err(e)
        } else {
            let _ = updates.send(ProgressMsg::Status(DownloadStatus::Merging));
            match merge::merge_chunks(scratch, &completed, &request.destination).await {
                Ok(()) => {
                    let _ = updates.send(ProgressMsg::Status(DownloadStatus::Completed));
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        // Close the channel and wait for the final snapshot before the
        // completion event can be observed.
        drop(updates);
        let _ = aggregator.await;

        outcome.map(|()| {
            scratch.cleanup();
            request.destination.clone()
        })
    }

    /// Single-stream pipeline: sequential transfer, then finalize.
    async fn run_single(
        &self,
        request: &DownloadRequest,
        total: Option<u64>,
        scratch: &DownloadScratch,
        cancel: &CancellationToken,
    ) -> DownloadResult<PathBuf> {
        let (updates, aggregator) = progress::spawn_aggregator(
            request.id.clone(),
            total,
            Vec::new(),
            Arc::clone(&self.emitter),
            self.config.progress_interval,
        );

        let single = scratch.single_path(&request.id);
        let outcome = match fallback::stream_single(
            &self.client,
            &request.url,
            &single,
            cancel,
            &updates,
        )
        .await
        {
            Ok(_received) => {
                let _ = updates.send(ProgressMsg::Status(DownloadStatus::Merging));
                match merge::finalize_single(&single, &request.destination).await {
                    Ok(()) => {
                        let _ = updates.send(ProgressMsg::Status(DownloadStatus::Completed));
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        drop(updates);
        let _ = aggregator.await;

        outcome.map(|()| {
            scratch.cleanup();
            request.destination.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segload_core::ports::NoopDownloadEmitter;

    #[test]
    fn lease_id_equality() {
        let l1 = LeaseId(1);
        let l2 = LeaseId(1);
        let l3 = LeaseId(2);

        assert_eq!(l1, l2);
        assert_ne!(l1, l3);
    }

    #[test]
    fn config_default_interval() {
        let config = EngineConfig::new("/tmp/segload");
        assert_eq!(config.progress_interval, Duration::from_millis(100));
        assert_eq!(config.scratch_root, PathBuf::from("/tmp/segload"));
    }

    #[tokio::test]
    async fn pause_on_inactive_id_is_a_noop() {
        let engine = Arc::new(DownloadEngine::new(
            EngineConfig::new("/tmp/segload-test"),
            Arc::new(NoopDownloadEmitter::new()),
        ));
        assert!(!engine.pause(&DownloadId::new("nope")).await);
        assert_eq!(engine.active_count().await, 0);
    }
}
