/*!
 * Terminal progress bar for command-line transfers
 */

use crate::progress::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};

/// [`ProgressSink`] that drives an indicatif bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template(
                "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(message.into());
        Self { bar }
    }

    /// Bar that renders nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressSink for BarProgress {
    fn update(&self, transferred: u64, total: u64) {
        if total > 0 && self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(transferred);
    }
}
