//! CLI entry point - the composition root.
//!
//! This is the only place where infrastructure is wired together: the
//! download engine, the channel-backed event emitter, and the terminal
//! progress display. Ctrl-C pauses the active download and exits,
//! leaving partial range files in the scratch directory; re-running the
//! same command resumes them through the on-disk reconciliation in the
//! range streamer.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use segload_core::download::{
    DEFAULT_SEGMENTS, DownloadEvent, DownloadId, DownloadRequest, MAX_SEGMENTS,
};
use segload_core::ports::DownloadEventEmitterPort;
use segload_download::{DownloadEngine, EngineConfig};

use progress::DownloadDisplay;

/// Segmented HTTP downloader.
#[derive(Debug, Parser)]
#[command(name = "segload", version, about)]
struct Cli {
    /// URL to download.
    url: String,

    /// Destination file (defaults to the last URL path segment).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of concurrent byte-range segments (1-8).
    #[arg(short, long, default_value_t = DEFAULT_SEGMENTS, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SEGMENTS)))]
    segments: u32,

    /// Directory for partial range files (defaults to the system temp dir).
    #[arg(long, env = "SEGLOAD_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

/// Forwards engine events into the main loop's channel.
#[derive(Clone)]
struct ChannelEmitter {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl DownloadEventEmitterPort for ChannelEmitter {
    fn emit(&self, event: DownloadEvent) {
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

/// Pick a destination file name from the URL path.
fn infer_file_name(url: &str) -> PathBuf {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let name = trimmed
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download");
    PathBuf::from(name)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let destination = cli
        .output
        .unwrap_or_else(|| infer_file_name(&cli.url));
    let scratch_root = cli
        .scratch_dir
        .unwrap_or_else(|| std::env::temp_dir().join("segload"));
    let label = destination
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();
    // The file name doubles as the download identifier, which keys the
    // scratch directory and so makes re-runs resume-compatible.
    let id = DownloadId::new(label.clone());

    let (tx, mut events) = mpsc::unbounded_channel();
    let engine = Arc::new(DownloadEngine::new(
        EngineConfig::new(scratch_root),
        Arc::new(ChannelEmitter { tx }),
    ));

    let request = DownloadRequest::new(id.clone(), cli.url, destination)
        .with_segments(cli.segments);
    engine
        .enqueue(request)
        .await
        .then_some(())
        .context("download could not be enqueued")?;

    let mut display = DownloadDisplay::new(&label);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                engine.pause(&id).await;
                display.finish();
                println!("Paused {label}; partial ranges kept. Re-run the same command to resume.");
                return Ok(());
            }

            event = events.recv() => match event {
                Some(DownloadEvent::Started { .. }) => {}
                Some(DownloadEvent::Progress { snapshot }) => display.update(&snapshot),
                Some(DownloadEvent::Completed { path, .. }) => {
                    display.finish();
                    println!("Downloaded {label} -> {}", path.display());
                    return Ok(());
                }
                Some(DownloadEvent::Failed { error, .. }) => {
                    display.finish();
                    anyhow::bail!("download failed: {error}");
                }
                None => anyhow::bail!("download engine stopped unexpectedly"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_comes_from_last_path_segment() {
        assert_eq!(
            infer_file_name("https://example.com/dir/archive.tar.gz"),
            PathBuf::from("archive.tar.gz")
        );
    }

    #[test]
    fn file_name_ignores_query_and_fragment() {
        assert_eq!(
            infer_file_name("https://example.com/file.bin?token=abc#part"),
            PathBuf::from("file.bin")
        );
    }

    #[test]
    fn trailing_slash_falls_back_to_default_name() {
        assert_eq!(infer_file_name("https://example.com/"), PathBuf::from("download"));
    }
}
