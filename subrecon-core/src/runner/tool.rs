//! Tool source execution.

use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::progress::SourceStatus;
use crate::sources::ToolSource;

const STDERR_LOG_LIMIT: usize = 512;

/// Runs one tool against one target: spawn with stdin closed and both
/// output streams captured, wait under the per-task ceiling, then filter
/// stdout line by line. Tool attempts are never retried.
pub(crate) async fn run_tool(
    name: &str,
    tool: &ToolSource,
    target: &str,
    task_timeout: Duration,
    cancel: &CancellationToken,
) -> (BTreeSet<String>, SourceStatus) {
    let argv = (tool.build_command)(target);
    let Some((program, args)) = argv.split_first() else {
        warn!(source = name, "tool built an empty command line");
        return (BTreeSet::new(), SourceStatus::Failed);
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(source = name, program = %program, error = %err, "failed to spawn tool");
            return (BTreeSet::new(), SourceStatus::Failed);
        }
    };

    // Dropping the wait future kills the child via kill_on_drop, so the
    // timeout and cancellation arms leave no orphan process behind.
    let output = tokio::select! {
        waited = timeout(task_timeout, child.wait_with_output()) => match waited {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(source = name, error = %err, "waiting on tool failed");
                return (BTreeSet::new(), SourceStatus::Failed);
            }
            Err(_) => {
                debug!(source = name, "tool hit the per-task timeout");
                return (BTreeSet::new(), SourceStatus::Timeout);
            }
        },
        _ = cancel.cancelled() => {
            debug!(source = name, "tool cancelled");
            return (BTreeSet::new(), SourceStatus::Timeout);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            source = name,
            status = %output.status,
            stderr = %truncate(&stderr, STDERR_LOG_LIMIT),
            "tool exited with failure"
        );
        return (BTreeSet::new(), SourceStatus::Failed);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    (super::sift(stdout.lines()), SourceStatus::Completed)
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => text.get(..index).unwrap_or(text),
        None => text,
    }
}
