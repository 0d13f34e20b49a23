//! Batch driver: cache consult, scan, persist, emit.
//!
//! One target failing never aborts the batch; one source failing never
//! aborts its target. Fatal errors are reserved for an unusable input
//! surface (no valid targets, no sources, unreadable files).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use subrecon_core::cache::CacheStore;
use subrecon_core::config::EngineConfig;
use subrecon_core::sources::builtin::builtin_sources;
use subrecon_core::sources::{load_sources, selected_names};
use subrecon_core::{
    http, orchestrator, LoadOptions, NullSink, ProgressSink, SourceDescriptor, Target,
    ENGINE_VERSION,
};

use crate::cli::{Cli, Commands};
use crate::output;
use crate::progress::IndicatifSink;

type SourceSet = BTreeMap<String, Arc<SourceDescriptor>>;

/// Runs the whole batch. `Ok(true)` means at least one target produced a
/// report (possibly from cache); `Ok(false)` means every target failed.
pub(crate) async fn run(args: Cli) -> Result<bool> {
    if let Some(Commands::Sources) = &args.command {
        return list_sources(&args);
    }

    let mut config = EngineConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let targets = collect_targets(&args)?;
    if targets.is_empty() {
        bail!("no valid targets to scan");
    }

    let sources = gate_sources(&args);
    if sources.is_empty() {
        bail!("no sources survived gating");
    }
    info!(
        targets = targets.len(),
        sources = sources.len(),
        "starting scan"
    );

    let client = http::build_client(&config);
    let cache = open_cache(&args, &sources);
    let sink: Arc<dyn ProgressSink> = if args.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(IndicatifSink::new())
    };

    let mut succeeded = 0usize;
    for target in &targets {
        let outcome = process_target(
            target,
            &sources,
            &client,
            &config,
            cache.as_ref(),
            sink.as_ref(),
            &args,
        )
        .await;
        match outcome {
            Ok(()) => succeeded += 1,
            Err(err) => warn!(domain = %target.ascii, error = %err, "target failed"),
        }
    }

    Ok(succeeded > 0)
}

fn apply_overrides(config: &mut EngineConfig, args: &Cli) {
    if let Some(seconds) = args.task_timeout {
        config.task_timeout_seconds = seconds;
    }
    if let Some(seconds) = args.target_timeout {
        config.target_timeout_seconds = seconds;
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
}

fn gate_sources(args: &Cli) -> SourceSet {
    let options = LoadOptions {
        include: args.include.clone(),
        exclude: args.exclude.clone(),
    };
    load_sources(builtin_sources(), &options)
}

/// Gathers targets from the positional arguments and the optional list
/// file, skipping blanks, comments, duplicates, and anything the validator
/// rejects.
fn collect_targets(args: &Cli) -> Result<Vec<Target>> {
    let mut raw = args.targets.clone();
    if let Some(path) = &args.list {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading target list {}", path.display()))?;
        raw.extend(contents.lines().map(str::to_string));
    }

    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();
    for input in raw {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match Target::parse(trimmed) {
            Some(target) => {
                if seen.insert(target.ascii.clone()) {
                    targets.push(target);
                }
            }
            None => warn!(input = trimmed, "skipping invalid target"),
        }
    }
    Ok(targets)
}

/// The cache is optional: disabled by flag, or when no usable directory
/// exists. Trouble opening it degrades to a live-scan-only run.
fn open_cache(args: &Cli, sources: &SourceSet) -> Option<CacheStore> {
    if args.no_cache {
        return None;
    }
    let dir = args
        .cache_dir
        .clone()
        .or_else(|| dirs::cache_dir().map(|base| base.join("subrecon")))?;
    match CacheStore::open(dir, ENGINE_VERSION, &selected_names(sources)) {
        Ok(store) => Some(store),
        Err(err) => {
            warn!(error = %err, "cache disabled");
            None
        }
    }
}

async fn process_target(
    target: &Target,
    sources: &SourceSet,
    client: &http::Client,
    config: &EngineConfig,
    cache: Option<&CacheStore>,
    sink: &dyn ProgressSink,
    args: &Cli,
) -> Result<()> {
    if let Some(store) = cache {
        if let Some(report) = store.read(&target.ascii).await {
            info!(domain = %target.ascii, count = report.subdomains.len(), "cache hit");
            return output::write_report(
                &report,
                &target.ascii,
                args.format,
                args.output.as_deref(),
                args.overwrite,
            );
        }
    }

    let cancel = CancellationToken::new();
    let scan = orchestrator::scan(target, sources, client, config, sink, &cancel);
    let report = match config.target_timeout() {
        Some(ceiling) => {
            tokio::pin!(scan);
            match tokio::time::timeout(ceiling, &mut scan).await {
                Ok(report) => report?,
                Err(_) => {
                    // Let the runners observe the cancellation and emit
                    // their terminal statuses before giving up on the
                    // target.
                    cancel.cancel();
                    let _ = scan.await;
                    bail!("target timed out after {}s", ceiling.as_secs());
                }
            }
        }
        None => scan.await?,
    };

    if let Some(store) = cache {
        store.write(&target.ascii, &report).await;
    }
    output::write_report(
        &report,
        &target.ascii,
        args.format,
        args.output.as_deref(),
        args.overwrite,
    )
}

fn list_sources(args: &Cli) -> Result<bool> {
    let selected = gate_sources(args);
    for descriptor in builtin_sources() {
        let status = if selected.contains_key(&descriptor.name) {
            "ready"
        } else {
            "gated out"
        };
        println!(
            "{:<14} {:<5} {status}",
            descriptor.name,
            descriptor.kind_label()
        );
    }
    Ok(true)
}
