//! Source runners.
//!
//! One runner drives one source against one target and always reaches a
//! terminal status: spawn failures, timeouts, transport errors, and parser
//! misbehavior all fold into [`SourceStatus`] instead of propagating. The
//! orchestrator never sees an `Err` from here.

mod api;
mod tool;

pub use api::AttemptError;

use std::collections::BTreeSet;
use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::progress::{ProgressSink, SourceStatus};
use crate::sources::{SourceDescriptor, SourceKind};
use crate::validator;

/// Outcome of one source against one target.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub name: String,
    pub subdomains: BTreeSet<String>,
    pub status: SourceStatus,
}

/// Drives one source to completion, reporting `Running` at start and the
/// terminal status with the final item count at the end.
pub async fn run_source(
    descriptor: Arc<SourceDescriptor>,
    target: &str,
    client: &Client,
    config: &EngineConfig,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> SourceResult {
    sink.update(&descriptor.name, 0, Some(SourceStatus::Running))
        .await;

    let (subdomains, status) = match &descriptor.kind {
        SourceKind::Tool(tool) => {
            tool::run_tool(
                &descriptor.name,
                tool,
                target,
                config.task_timeout(),
                cancel,
            )
            .await
        }
        SourceKind::Api(api) => {
            api::run_api(&descriptor.name, api, target, client, config, cancel).await
        }
    };

    sink.update(&descriptor.name, subdomains.len() as u64, Some(status))
        .await;

    SourceResult {
        name: descriptor.name.clone(),
        subdomains,
        status,
    }
}

/// Normalizes raw candidates and keeps only syntactically valid domains.
pub(crate) fn sift<I, S>(candidates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .map(|candidate| validator::normalize(candidate.as_ref()))
        .filter(|candidate| validator::is_valid(candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sift_normalizes_and_filters() {
        let sifted = sift([
            "A.Example.COM",
            "*.b.example.com",
            "not a domain",
            "1.2.3.4",
            "",
        ]);
        assert_eq!(sifted.len(), 2);
        assert!(sifted.contains("a.example.com"));
        assert!(sifted.contains("b.example.com"));
    }
}
