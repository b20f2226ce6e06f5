//! Progress display for sync transfers.

use crate::adb::sync::TransferStats;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix} {bytes} ({bytes_per_sec})";

/// Receives the snapshots a push or pull emits.
pub trait ProgressReporter: Send + Sync {
    /// Size became known, e.g. from a `STAT` before a pull.
    fn set_total(&self, total: u64);

    fn transferred(&self, stats: TransferStats);

    fn complete(&self, stats: TransferStats);

    fn abandon(&self, reason: &str);
}

/// Terminal bar, or a spinner while the size is unknown.
pub struct TransferBar {
    bar: ProgressBar,
}

impl TransferBar {
    pub fn sized(name: &str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(bar_style());
        bar.set_prefix(name.to_string());
        Self { bar }
    }

    pub fn spinner(name: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_prefix(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter for TransferBar {
    fn set_total(&self, total: u64) {
        self.bar.set_style(bar_style());
        self.bar.set_length(total);
    }

    fn transferred(&self, stats: TransferStats) {
        self.bar.set_position(stats.bytes_transferred);
    }

    fn complete(&self, stats: TransferStats) {
        self.bar.set_position(stats.bytes_transferred);
        self.bar
            .finish_with_message(format!("{} done", HumanBytes(stats.bytes_transferred)));
    }

    fn abandon(&self, reason: &str) {
        self.bar.abandon_with_message(reason.to_string());
    }
}

/// Used with `--quiet` and JSON output.
pub struct Silent;

impl ProgressReporter for Silent {
    fn set_total(&self, _total: u64) {}
    fn transferred(&self, _stats: TransferStats) {}
    fn complete(&self, _stats: TransferStats) {}
    fn abandon(&self, _reason: &str) {}
}

/// Picks a reporter for a transfer, `Silent` when progress is disabled.
pub fn reporter(enabled: bool, name: &str, total: Option<u64>) -> Box<dyn ProgressReporter> {
    match (enabled, total) {
        (false, _) => Box::new(Silent),
        (true, Some(total)) => Box::new(TransferBar::sized(name, total)),
        (true, None) => Box::new(TransferBar::spinner(name)),
    }
}
