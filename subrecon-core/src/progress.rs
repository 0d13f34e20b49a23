//! Progress sink contract between the engine and a front end.
//!
//! The engine only ever calls [`ProgressSink::update`]; rendering is the
//! front end's business.

use std::fmt;

use async_trait::async_trait;

/// Lifecycle states a source moves through while scanning one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl SourceStatus {
    /// Whether this status ends a source's run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// Receives per-source lifecycle events during a scan.
///
/// Every source reports `Running` once at start and exactly one terminal
/// status at the end, with the final item count. Intermediate count
/// increments are permitted in between.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update(&self, source: &str, count_increment: u64, status: Option<SourceStatus>);
}

/// Sink that discards every event. Used for quiet mode and tests that do
/// not observe progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn update(&self, _source: &str, _count_increment: u64, _status: Option<SourceStatus>) {}
}
