//! Terminal progress display.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use subrecon_core::{ProgressSink, SourceStatus};

/// Renders one spinner line per source under a shared multi-progress.
pub(crate) struct IndicatifSink {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl IndicatifSink {
    pub(crate) fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar(&self, source: &str) -> ProgressBar {
        let mut bars = self.bars.lock().expect("progress mutex");
        bars.entry(source.to_string())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(
                    ProgressStyle::with_template("{spinner} {prefix:<14} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.set_prefix(source.to_string());
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            })
            .clone()
    }
}

#[async_trait]
impl ProgressSink for IndicatifSink {
    async fn update(&self, source: &str, count_increment: u64, status: Option<SourceStatus>) {
        let bar = self.bar(source);
        if count_increment > 0 {
            bar.inc(count_increment);
        }
        match status {
            Some(SourceStatus::Running) => bar.set_message("running"),
            Some(SourceStatus::Completed) => {
                bar.finish_with_message(format!("done, {} found", bar.position()));
            }
            Some(SourceStatus::Failed) => bar.finish_with_message("failed"),
            Some(SourceStatus::Timeout) => bar.finish_with_message("timed out"),
            Some(SourceStatus::Pending) | None => {}
        }
    }
}
