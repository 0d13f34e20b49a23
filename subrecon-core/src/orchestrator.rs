//! Target orchestration: fan-out, completion-order merge, scope filtering.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::EngineConfig;
use crate::progress::{ProgressSink, SourceStatus};
use crate::runner::{self, SourceResult};
use crate::sources::SourceDescriptor;
use crate::validator::{self, Target};

/// Final, deduplicated, in-scope result for one target: the sorted
/// subdomain list and how many new names each source contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub subdomains: Vec<String>,
    pub contributions: BTreeMap<String, u64>,
}

/// Compiles the in-scope matcher for an apex: one or more valid labels
/// followed by the apex itself. The apex alone and out-of-tree names never
/// match.
pub fn scope_matcher(apex: &str) -> Result<Regex> {
    let pattern = format!(
        "^({label}\\.)+{apex}$",
        label = validator::LABEL_PATTERN,
        apex = regex::escape(apex)
    );
    Regex::new(&pattern).with_context(|| format!("building the scope filter for {apex}"))
}

/// Scans one target across every selected source.
///
/// All runners launch together and results merge in completion order: the
/// first source to finish with a name owns its contribution credit. A
/// failing source only costs its own results; peers are never cancelled on
/// its behalf. Names outside the target subtree are dropped before credit
/// is assigned, so contribution counts always add up against the final
/// list.
pub async fn scan(
    target: &Target,
    sources: &BTreeMap<String, Arc<SourceDescriptor>>,
    client: &Client,
    config: &EngineConfig,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<TargetReport> {
    let scope = scope_matcher(&target.ascii)?;

    let mut inflight: FuturesUnordered<_> = sources
        .values()
        .map(|descriptor| {
            runner::run_source(
                Arc::clone(descriptor),
                &target.ascii,
                client,
                config,
                sink,
                cancel,
            )
        })
        .collect();

    let mut union: BTreeSet<String> = BTreeSet::new();
    let mut contributions: BTreeMap<String, u64> = BTreeMap::new();

    while let Some(result) = inflight.next().await {
        let SourceResult {
            name,
            subdomains,
            status,
        } = result;
        if status != SourceStatus::Completed {
            debug!(source = %name, %status, "source finished without results");
            continue;
        }
        let mut fresh = 0u64;
        for candidate in subdomains {
            if scope.is_match(&candidate) && union.insert(candidate) {
                fresh += 1;
            }
        }
        debug!(source = %name, fresh, "merged source result");
        contributions.insert(name, fresh);
    }

    Ok(TargetReport {
        subdomains: union.into_iter().collect(),
        contributions,
    })
}
