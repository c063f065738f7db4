//! Progress reporting, kept behind a trait so the dispatcher never touches
//! a terminal directly. `main.rs` is the only place that wires up the real,
//! `indicatif`-backed sink.

use indicatif::{ProgressBar, ProgressStyle};

pub trait ProgressSink {
    fn advance(&self, bytes: u64);
    fn finish(&self);
}

/// Terminal progress bar keyed off the estimated total archive size.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(total_bytes: u64) -> BarSink {
        let bar = ProgressBar::new(total_bytes);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        BarSink { bar }
    }
}

impl ProgressSink for BarSink {
    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

/// No-op sink for embedding or tests where a terminal bar is unwanted.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
}
