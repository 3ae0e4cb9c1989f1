use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

/// Default timeout for provider CLI commands (describe, stop, etc.).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(60);

/// Error returned when a command exceeds its timeout budget.
///
/// Typed so callers can tell "the transport stalled" apart from "the
/// process could not be spawned" and classify it as retryable.
#[derive(Debug, thiserror::Error)]
#[error("{program} timed out after {}s", .timeout.as_secs())]
pub struct CommandTimeout {
    pub program: String,
    pub timeout: Duration,
}

/// Generic command execution with timeout and guaranteed process kill.
///
/// This trait is not tied to any particular external binary — it can run
/// the cloud provider CLI, `ssh`, or `scp`. The production implementation
/// uses tokio; test doubles return canned results without spawning
/// processes.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a command with the default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Run a command with a custom timeout (overrides default).
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or a
    /// [`CommandTimeout`] if it exceeds `timeout`. On timeout, the child
    /// process must be killed, not left orphaned.
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

/// Production `CommandRunner` — uses tokio for async process execution
/// with guaranteed timeout and kill on all platforms.
///
/// A plain `tokio::time::timeout` around `.output().await` does not kill
/// the child when the timeout fires on every platform — the future is
/// dropped but the OS process keeps running. `tokio::select!` with an
/// explicit `child.kill()` guarantees termination.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        // Read stdout/stderr CONCURRENTLY with wait(). A child writing more
        // than the OS pipe buffer blocks on write; waiting first would never
        // resolve.
        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                Err(CommandTimeout { program: program.to_string(), timeout }.into())
            }
        }
    }
}
