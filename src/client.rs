//! Generation client: spawns the external generator CLI and applies the
//! two-cycle retry policy for transient overload.
//!
//! The pipeline talks to a [`Generator`] trait object, so tests substitute a
//! scripted stub. The production implementation, [`CliGenerator`], runs the
//! configured command with the prompt on stdin and collects stdout. A hung
//! process is terminated together with its whole process group, not just the
//! direct child.

use crate::config::RetryPolicy;
use crate::errors::ClientError;
use async_trait::async_trait;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// One generation call: the prompt plus the per-pass knobs.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub tools: String,
    pub effort: String,
    pub timeout: Duration,
}

/// Anything that can answer a generation request.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ClientError>;
}

/// Retry driver: one cycle of `max_attempts` with short waits, a single long
/// cooldown, a second cycle, then [`ClientError::RateLimitExhausted`]. Only
/// transient errors are retried; anything else returns immediately.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempts = 0u32;
    for cycle in 0..2 {
        if cycle == 1 {
            warn!(
                cooldown_secs = policy.cooldown_secs,
                "rate limited through first cycle, entering cooldown"
            );
            tokio::time::sleep(policy.cooldown()).await;
        }
        for i in 0..policy.max_attempts {
            if i > 0 {
                tokio::time::sleep(policy.short_wait()).await;
            }
            attempts += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    debug!(attempt = attempts, error = %err, "transient failure, will retry");
                }
                Err(err) => return Err(err),
            }
        }
    }
    Err(ClientError::RateLimitExhausted { attempts })
}

/// Production generator backed by an external CLI process.
#[derive(Debug, Clone)]
pub struct CliGenerator {
    command: String,
    retry: RetryPolicy,
}

impl CliGenerator {
    pub fn new(command: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            command: command.into(),
            retry,
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String, ClientError> {
        let handle = SupervisedChild::spawn(&self.command, request)?;

        let output = match handle.communicate(&request.prompt, request.timeout).await? {
            Some(output) => output,
            None => {
                return Err(ClientError::TimedOut {
                    timeout_secs: request.timeout.as_secs(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            if self.retry.is_rate_limited(&stderr) {
                return Err(ClientError::RateLimited { stderr });
            }
            return Err(ClientError::NonZeroExit {
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// A spawned generator process that owns its process group, so the whole
/// subtree can be torn down, not just the direct child.
struct SupervisedChild {
    child: tokio::process::Child,
    #[cfg(unix)]
    pgid: Option<u32>,
}

impl SupervisedChild {
    fn spawn(command: &str, request: &GenerationRequest) -> Result<Self, ClientError> {
        let mut cmd = Command::new(command);
        cmd.arg("-p")
            .arg("--model")
            .arg(&request.model)
            .arg("--allowed-tools")
            .arg(&request.tools)
            .arg("--effort")
            .arg(&request.effort)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| ClientError::SpawnFailed {
            command: command.to_string(),
            source,
        })?;

        #[cfg(unix)]
        let pgid = child.id();

        Ok(Self {
            child,
            #[cfg(unix)]
            pgid,
        })
    }

    /// Write the prompt to the child's stdin, collect its output, or `None`
    /// on timeout after the process tree has been terminated.
    ///
    /// The timeout covers the stdin write as well as the wait: a child that
    /// never drains a pipe-buffer-sized prompt still gets torn down on
    /// schedule.
    async fn communicate(
        mut self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Option<std::process::Output>, ClientError> {
        #[cfg(unix)]
        let pgid = self.pgid;

        let stdin = self.child.stdin.take();
        let child = self.child;
        let io = async move {
            let feed = async {
                if let Some(mut stdin) = stdin {
                    match stdin.write_all(prompt.as_bytes()).await {
                        Ok(()) => stdin.shutdown().await?,
                        // Child exited without reading; its status and
                        // stderr tell the real story.
                        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        match tokio::time::timeout(timeout, io).await {
            Ok(result) => Ok(Some(result?)),
            Err(_) => {
                #[cfg(unix)]
                kill_process_group(pgid).await;
                Ok(None)
            }
        }
    }
}

/// SIGTERM the whole group, give it a grace period, then SIGKILL whatever
/// is left. Errors are ignored; the group may already be gone.
#[cfg(unix)]
async fn kill_process_group(pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    const KILL_GRACE: Duration = Duration::from_secs(5);

    let Some(pgid) = pgid else { return };
    let pid = Pid::from_raw(pgid as i32);
    let _ = killpg(pid, Signal::SIGTERM);
    tokio::time::sleep(KILL_GRACE).await;
    let _ = killpg(pid, Signal::SIGKILL);
}

#[async_trait]
impl Generator for CliGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ClientError> {
        if request.prompt.trim().is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        if request.timeout.is_zero() {
            return Err(ClientError::ZeroTimeout);
        }

        debug!(
            model = %request.model,
            tools = %request.tools,
            effort = %request.effort,
            timeout_secs = request.timeout.as_secs(),
            prompt_chars = request.prompt.chars().count(),
            "spawning generator"
        );

        run_with_retry(&self.retry, || self.attempt(request)).await
    }
}

/// Run a generation call in degraded mode: a failure logs a warning and
/// yields an empty string instead of aborting the pass.
pub async fn generate_lenient(
    generator: &dyn Generator,
    request: &GenerationRequest,
    stage: &str,
) -> String {
    match generator.generate(request).await {
        Ok(output) => output,
        Err(err) => {
            warn!(stage, error = %err, "generation failed, continuing degraded");
            String::new()
        }
    }
}
