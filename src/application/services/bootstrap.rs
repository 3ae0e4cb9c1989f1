//! Instance bootstrap: SSH connectivity wait, prerequisite packages, and
//! the pinned configuration tool.
//!
//! Every remote command runs through the command-batch check — a non-zero
//! exit surfaces each failing command with its captured output.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::retry::{self, RetryPolicy, StepError};
use crate::command_runner::CommandTimeout;
use crate::domain::job::{BatchError, Job, ensure_all_succeeded};

/// Connectivity probing: 5 attempts, 10 s apart, 60 s transport budget each.
pub const CONNECT_POLICY: RetryPolicy = RetryPolicy::new(5, Duration::from_secs(10));

/// Package installation: a failed sequence restarts from the top.
pub const INSTALL_POLICY: RetryPolicy = RetryPolicy::new(5, Duration::from_secs(10));

const SSH_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Commands run under the install policy, in order.
const PREREQ_COMMANDS: [&str; 3] = [
    "sudo apt-get update",
    "sudo apt-get -y install ruby",
    "sudo apt-get -y install rubygems",
];

const CHEF_VERSION: &str = "0.10.8";

/// Run one remote command and capture it as a job.
///
/// # Errors
///
/// Returns an error only if the transport fails; a non-zero remote exit
/// is reported in the returned job, not as an error.
pub async fn run_command(shell: &impl RemoteShell, host: &str, command: &str) -> Result<Job> {
    let output = shell.exec(host, command).await?;
    Ok(Job::from_output(command, &output))
}

/// Run one remote command and fail fast unless it exited zero.
///
/// # Errors
///
/// Returns a [`BatchError`] carrying the failing job.
pub async fn run_checked(shell: &impl RemoteShell, host: &str, command: &str) -> Result<()> {
    let job = run_command(shell, host, command).await?;
    ensure_all_succeeded(std::slice::from_ref(&job))?;
    Ok(())
}

/// Wait until the instance accepts SSH connections.
///
/// Probes with a trivial remote command. Refused connections and transport
/// timeouts are retryable; a transport that cannot be spawned at all is
/// fatal.
///
/// # Errors
///
/// Returns a retries-exhausted error if the host never answers within the
/// connectivity budget.
pub async fn wait_for_connectivity(
    shell: &impl RemoteShell,
    host: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    wait_for_connectivity_with(CONNECT_POLICY, shell, host, reporter).await
}

pub(crate) async fn wait_for_connectivity_with(
    policy: RetryPolicy,
    shell: &impl RemoteShell,
    host: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step(&format!("waiting for ssh on {host}..."));
    retry::retry(
        policy,
        &format!("connecting to {host} over ssh"),
        async |attempt| {
            if attempt > 1 {
                reporter.warn(&format!("ssh not answering, attempt {attempt}..."));
            }
            match shell.exec_with_timeout(host, "true", SSH_ATTEMPT_TIMEOUT).await {
                Ok(output) if output.status.success() => Ok(()),
                Ok(output) => Err(StepError::Retryable(anyhow::anyhow!(
                    "ssh probe exited with {}",
                    output.status
                ))),
                Err(e) if e.is::<CommandTimeout>() => Err(StepError::Retryable(e)),
                Err(e) => Err(StepError::Fatal(e)),
            }
        },
    )
    .await?;
    reporter.success(&format!("{host} is accepting ssh connections"));
    Ok(())
}

/// Install the prerequisite packages, retrying the whole sequence from
/// the top when any step exits non-zero.
///
/// # Errors
///
/// Returns a retries-exhausted error when the install budget runs out;
/// transport failures propagate immediately.
pub async fn install_prerequisites(
    shell: &impl RemoteShell,
    host: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    install_prerequisites_with(INSTALL_POLICY, shell, host, reporter).await
}

pub(crate) async fn install_prerequisites_with(
    policy: RetryPolicy,
    shell: &impl RemoteShell,
    host: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    retry::retry(policy, "installing prerequisite packages", async |attempt| {
        if attempt > 1 {
            reporter.warn(&format!("package install failed, attempt {attempt}..."));
        }
        for command in PREREQ_COMMANDS {
            reporter.step(&format!("running '{command}'..."));
            if let Err(e) = run_checked(shell, host, command).await {
                // Non-zero exits restart the sequence; transport errors do not.
                return Err(if e.is::<BatchError>() {
                    StepError::Retryable(e)
                } else {
                    StepError::Fatal(e)
                });
            }
        }
        Ok(())
    })
    .await
}

/// Install the pinned chef gem.
///
/// # Errors
///
/// Returns an error if the install command fails.
pub async fn install_chef(
    shell: &impl RemoteShell,
    host: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("installing chef...");
    run_checked(
        shell,
        host,
        &format!("sudo gem install chef --no-ri --no-rdoc --version {CHEF_VERSION}"),
    )
    .await
}

/// Full bootstrap: connectivity, prerequisites, configuration tool.
///
/// # Errors
///
/// Returns an error if any phase fails.
pub async fn bootstrap(
    shell: &impl RemoteShell,
    host: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    wait_for_connectivity(shell, host, reporter).await?;
    install_prerequisites(shell, host, reporter).await?;
    install_chef(shell, host, reporter).await?;
    reporter.success("instance bootstrapped");
    Ok(())
}
