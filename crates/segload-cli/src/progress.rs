//! Terminal progress rendering.
//!
//! Presentation-only module: consumes progress snapshots and draws
//! either an indicatif bar (interactive terminal) or throttled plain
//! lines (pipes, CI logs).

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use segload_core::download::{DownloadStatus, ProgressSnapshot};

/// Progress display that automatically selects terminal or plain output.
pub struct DownloadDisplay {
    inner: Render,
}

enum Render {
    Fancy(FancyBar),
    Plain(PlainLines),
}

impl DownloadDisplay {
    /// Create a new display, auto-detecting terminal capability.
    pub fn new(label: &str) -> Self {
        if io::stdout().is_terminal() {
            Self {
                inner: Render::Fancy(FancyBar::new(label)),
            }
        } else {
            Self {
                inner: Render::Plain(PlainLines::new(label)),
            }
        }
    }

    /// Redraw from the latest snapshot.
    pub fn update(&mut self, snapshot: &ProgressSnapshot) {
        match &mut self.inner {
            Render::Fancy(inner) => inner.update(snapshot),
            Render::Plain(inner) => inner.update(snapshot),
        }
    }

    /// Clear the display, leaving the terminal clean for a final line.
    pub fn finish(&mut self) {
        match &mut self.inner {
            Render::Fancy(inner) => inner.bar.finish_and_clear(),
            Render::Plain(inner) => inner.finish(),
        }
    }
}

struct FancyBar {
    bar: ProgressBar,
    saw_length: bool,
}

impl FancyBar {
    fn new(label: &str) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
        bar.set_style(Self::spinner_style());
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            saw_length: false,
        }
    }

    fn update(&mut self, snapshot: &ProgressSnapshot) {
        if snapshot.status == DownloadStatus::Merging {
            self.bar.set_style(Self::spinner_style());
            self.bar.set_message("merging ranges".to_string());
            self.saw_length = false;
            return;
        }

        match snapshot.total {
            Some(total) if total > 0 => {
                if !self.saw_length {
                    self.bar.set_style(Self::bar_style());
                    self.bar.set_length(total);
                    self.saw_length = true;
                }
                self.bar.set_position(snapshot.received.min(total));
            }
            _ => {
                // Unknown length: spinner with a live byte counter.
                self.bar
                    .set_message(format!("{} received", HumanBytes(snapshot.received)));
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg} {spinner}").unwrap()
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg} {bar:28.cyan/blue} {human_bytes:>9} / {human_total:>9} ({percent:>3}%) @ {binary_bytes_per_sec} ETA {eta}",
        )
        .unwrap()
        .with_key(
            "human_bytes",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{}", HumanBytes(state.pos()));
            },
        )
        .with_key(
            "human_total",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let value = state
                    .len()
                    .map_or_else(|| "?".to_string(), |len| HumanBytes(len).to_string());
                let _ = write!(w, "{value}");
            },
        )
    }
}

struct PlainLines {
    label: String,
    last_emit: Instant,
    printed: bool,
}

impl PlainLines {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            last_emit: Instant::now(),
            printed: false,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn update(&mut self, snapshot: &ProgressSnapshot) {
        const MIN_INTERVAL: Duration = Duration::from_millis(500);
        let now = Instant::now();
        let complete = snapshot
            .total
            .is_some_and(|total| snapshot.received >= total);
        if self.printed && !complete && now.duration_since(self.last_emit) < MIN_INTERVAL {
            return;
        }
        self.last_emit = now;
        self.printed = true;

        let total = snapshot.total.map_or_else(
            || "?".to_string(),
            |total| HumanBytes(total).to_string(),
        );
        println!(
            "{}: {} / {} ({:.1}%) @ {}/s [{}]",
            self.label,
            HumanBytes(snapshot.received),
            total,
            snapshot.fraction * 100.0,
            HumanBytes(snapshot.speed_bps as u64),
            snapshot.status.as_str(),
        );
        let _ = io::stdout().flush();
    }

    fn finish(&mut self) {
        let _ = io::stdout().flush();
    }
}
