//! Optional illustration collaborators.
//!
//! When `[illustration] command` is configured, the postprocess step invokes
//! it with the topic directory as its argument so it can read the final
//! article and drop cover assets next to it. A second optional hook,
//! `collect_command`, runs afterwards to gather the article's inline images.
//! Both are fully external; a failure or timeout is logged and the run
//! continues.

use crate::config::IllustrationConfig;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Outcome of the illustration step, for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllustrationOutcome {
    Skipped,
    Generated,
    Failed,
}

pub async fn generate_cover(config: &IllustrationConfig, topic_dir: &Path) -> IllustrationOutcome {
    let outcome = match &config.command {
        Some(command) => run_hook(command, config.timeout_secs, topic_dir, "cover").await,
        None => IllustrationOutcome::Skipped,
    };

    // Image collection rides along; its failures are logged by the hook
    // runner but the report carries the cover outcome.
    if let Some(command) = &config.collect_command {
        run_hook(command, config.timeout_secs, topic_dir, "image collection").await;
    }

    outcome
}

async fn run_hook(
    command: &str,
    timeout_secs: u64,
    topic_dir: &Path,
    hook: &str,
) -> IllustrationOutcome {
    let child = Command::new(command)
        .arg(topic_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(err) => {
            warn!(command, hook, error = %err, "illustration hook failed to start");
            return IllustrationOutcome::Failed;
        }
    };

    let timeout = Duration::from_secs(timeout_secs);
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) if output.status.success() => {
            info!(command, hook, "illustration hook completed");
            IllustrationOutcome::Generated
        }
        Ok(Ok(output)) => {
            warn!(
                command,
                hook,
                code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "illustration hook failed"
            );
            IllustrationOutcome::Failed
        }
        Ok(Err(err)) => {
            warn!(command, hook, error = %err, "illustration hook errored");
            IllustrationOutcome::Failed
        }
        Err(_) => {
            warn!(command, hook, timeout_secs, "illustration hook timed out");
            IllustrationOutcome::Failed
        }
    }
}
