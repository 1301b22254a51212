//! Terminal progress bar for batch commands.

use indicatif::{ProgressBar, ProgressStyle};
use stockset_core::progress::Progress;

const TEMPLATE: &str =
    "{prefix} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

/// `Progress` rendered as an indicatif bar; skipped items are printed above it.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix(label.to_string());
        Self { bar }
    }
}

impl Progress for BarProgress {
    fn on_start(&self, item: &str, _index: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message(item.to_string());
    }

    fn on_complete(&self, item: &str, _index: usize, _total: usize, failure: Option<&str>) {
        if let Some(reason) = failure {
            self.bar.println(format!("skipped {item}: {reason}"));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        self.bar
            .finish_with_message(format!("{succeeded}/{total} done, {failed} skipped"));
    }
}
