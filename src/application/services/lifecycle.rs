//! Instance lifecycle operations: launch, state, stop, terminate.
//!
//! Imports only from `crate::domain` and `crate::application`. Every
//! state-changing call is followed by bounded predicate polling until the
//! target state is reached — a timeout surfaces as an error, never as
//! silent success.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::application::ports::{
    InstanceInspector, InstanceLifecycle, LaunchSpec, ProgressReporter,
};
use crate::application::retry::{self, RetryPolicy};
use crate::domain::error::InstanceError;
use crate::domain::instance::{InstanceState, validate_instance_id};

/// Polling budget for instance state transitions (10 minutes).
const STATE_POLICY: RetryPolicy = RetryPolicy::new(40, Duration::from_secs(15));

const AWS_CLI_MIN_VERSION: semver::Version = semver::Version::new(2, 0, 0);

/// Launch a new instance and wait until it is running.
///
/// Returns the provider-assigned instance id.
///
/// # Errors
///
/// Returns an error if prerequisites are not met, the launch call fails,
/// the response carries no instance id, or the instance never reaches the
/// running state within budget.
pub async fn launch(
    provider: &(impl InstanceLifecycle + InstanceInspector),
    spec: &LaunchSpec<'_>,
    reporter: &impl ProgressReporter,
) -> Result<String> {
    check_prerequisites(provider).await?;

    reporter.step("launching instance...");
    let output = provider
        .run_instance(spec)
        .await
        .context("launching instance")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("failed to launch instance:\n{stderr}");
    }

    let instance_id = parse_instance_id(&output.stdout)?;
    validate_instance_id(&instance_id)?;

    reporter.step(&format!("waiting for {instance_id} to start..."));
    wait_for_state(provider, &instance_id, InstanceState::Running, STATE_POLICY).await?;
    reporter.success(&format!("instance {instance_id} is running"));
    Ok(instance_id)
}

/// Get current instance state.
///
/// A failed describe call or an unparseable response maps to `NotFound`
/// rather than an error so that state polling tolerates a provider that
/// has not yet caught up with its own launch response.
pub async fn state(inspector: &impl InstanceInspector, id: &str) -> InstanceState {
    let output = match inspector.describe_instance(id).await {
        Ok(o) if o.status.success() => o,
        _ => return InstanceState::NotFound,
    };
    let Ok(info) = serde_json::from_slice::<Value>(&output.stdout) else {
        return InstanceState::NotFound;
    };
    let name = first_instance(&info)
        .and_then(|i| i.get("State"))
        .and_then(|s| s.get("Name"))
        .and_then(|n| n.as_str())
        .unwrap_or("");
    InstanceState::parse(name)
}

/// Resolve the public DNS name of an instance, used to target SSH.
///
/// # Errors
///
/// Returns an error if the describe call fails or the instance has no
/// public DNS name yet.
pub async fn public_dns(inspector: &impl InstanceInspector, id: &str) -> Result<String> {
    let output = inspector
        .describe_instance(id)
        .await
        .context("describing instance")?;
    anyhow::ensure!(
        output.status.success(),
        "failed to describe instance {id}: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let info: Value =
        serde_json::from_slice(&output.stdout).context("parsing describe-instances output")?;
    first_instance(&info)
        .and_then(|i| i.get("PublicDnsName"))
        .and_then(|d| d.as_str())
        .filter(|d| !d.is_empty())
        .map(String::from)
        .ok_or_else(|| InstanceError::NoPublicDns(id.to_string()).into())
}

/// Stop an instance and wait until it is stopped.
///
/// # Errors
///
/// Returns an error if the stop call fails or the instance never reaches
/// the stopped state within budget.
pub async fn stop(
    provider: &(impl InstanceLifecycle + InstanceInspector),
    id: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step(&format!("stopping {id}..."));
    let output = provider
        .stop_instance(id)
        .await
        .context("stopping instance")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("failed to stop {id}:\n{stderr}");
    }
    wait_for_state(provider, id, InstanceState::Stopped, STATE_POLICY).await?;
    reporter.success(&format!("instance {id} stopped"));
    Ok(())
}

/// Terminate an instance and wait until it is terminated.
///
/// # Errors
///
/// Returns an error if the terminate call fails or the instance never
/// reaches the terminated state within budget.
pub async fn terminate(
    provider: &(impl InstanceLifecycle + InstanceInspector),
    id: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step(&format!("terminating {id}..."));
    let output = provider
        .terminate_instance(id)
        .await
        .context("terminating instance")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("failed to terminate {id}:\n{stderr}");
    }
    wait_for_state(provider, id, InstanceState::Terminated, STATE_POLICY).await?;
    reporter.success(&format!("instance {id} terminated"));
    Ok(())
}

// ── Private helpers ───────────────────────────────────────────────────────────

pub(crate) async fn wait_for_state(
    inspector: &impl InstanceInspector,
    id: &str,
    target: InstanceState,
    policy: RetryPolicy,
) -> Result<()> {
    retry::wait_until(
        policy,
        &format!("waiting for instance {id} to reach {}", target.display()),
        async || Ok(state(inspector, id).await == target),
    )
    .await
}

fn first_instance(info: &Value) -> Option<&Value> {
    info.get("Reservations")?
        .as_array()?
        .first()?
        .get("Instances")?
        .as_array()?
        .first()
}

fn parse_instance_id(stdout: &[u8]) -> Result<String> {
    let response: Value =
        serde_json::from_slice(stdout).context("parsing run-instances output")?;
    response
        .get("Instances")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|i| i.get("InstanceId"))
        .and_then(|s| s.as_str())
        .map(String::from)
        .ok_or_else(|| anyhow::anyhow!("no instance id in run-instances output"))
}

async fn check_prerequisites(inspector: &impl InstanceInspector) -> Result<()> {
    let output = inspector.cli_version().await.map_err(|_| {
        anyhow::anyhow!("AWS CLI not available.\n\nInstall it and run 'aws configure' first.")
    })?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(ver_str) = stdout
        .split_whitespace()
        .next()
        .and_then(|tok| tok.strip_prefix("aws-cli/"))
        && let Ok(v) = semver::Version::parse(ver_str)
        && v < AWS_CLI_MIN_VERSION
    {
        anyhow::bail!("AWS CLI {v} is too old; kiln needs {AWS_CLI_MIN_VERSION} or newer.");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::process::Output;

    use anyhow::Result;

    use super::*;
    use crate::application::services::test_support::{ReporterStub, fail_output, ok_output};
    use crate::domain::error::RetriesExhausted;

    const RUN_INSTANCES_JSON: &[u8] =
        br#"{"Instances":[{"InstanceId":"i-0a1b2c3d4e5f67890","State":{"Name":"pending"}}]}"#;

    fn describe_json(state: &str) -> Vec<u8> {
        format!(
            r#"{{"Reservations":[{{"Instances":[{{"InstanceId":"i-0a1b2c3d4e5f67890","State":{{"Name":"{state}"}},"PublicDnsName":"ec2-198-51-100-1.compute-1.amazonaws.com"}}]}}]}}"#
        )
        .into_bytes()
    }

    /// Provider stub scripted with a queue of describe responses.
    struct ProviderStub {
        run_calls: Cell<u32>,
        stop_calls: Cell<u32>,
        terminate_calls: Cell<u32>,
        run_output: Output,
        describes: RefCell<Vec<Output>>,
    }

    impl ProviderStub {
        fn new(run_output: Output, describes: Vec<Output>) -> Self {
            Self {
                run_calls: Cell::new(0),
                stop_calls: Cell::new(0),
                terminate_calls: Cell::new(0),
                run_output,
                describes: RefCell::new(describes),
            }
        }

        fn next_describe(&self) -> Output {
            let mut q = self.describes.borrow_mut();
            if q.len() > 1 {
                q.remove(0)
            } else {
                q.first()
                    .map(|o| Output {
                        status: o.status,
                        stdout: o.stdout.clone(),
                        stderr: o.stderr.clone(),
                    })
                    .expect("describe queue must not be empty")
            }
        }
    }

    impl InstanceLifecycle for ProviderStub {
        async fn run_instance(&self, _: &LaunchSpec<'_>) -> Result<Output> {
            self.run_calls.set(self.run_calls.get() + 1);
            Ok(Output {
                status: self.run_output.status,
                stdout: self.run_output.stdout.clone(),
                stderr: self.run_output.stderr.clone(),
            })
        }
        async fn stop_instance(&self, _: &str) -> Result<Output> {
            self.stop_calls.set(self.stop_calls.get() + 1);
            Ok(ok_output(b"{}"))
        }
        async fn terminate_instance(&self, _: &str) -> Result<Output> {
            self.terminate_calls.set(self.terminate_calls.get() + 1);
            Ok(ok_output(b"{}"))
        }
    }

    impl InstanceInspector for ProviderStub {
        async fn describe_instance(&self, _: &str) -> Result<Output> {
            Ok(self.next_describe())
        }
        async fn cli_version(&self) -> Result<Output> {
            Ok(ok_output(b"aws-cli/2.15.30 Python/3.11.8 Linux/6.1 exe/x86_64"))
        }
    }

    #[tokio::test]
    async fn state_running() {
        let provider = ProviderStub::new(ok_output(b"{}"), vec![ok_output(&describe_json("running"))]);
        assert_eq!(
            state(&provider, "i-0a1b2c3d4e5f67890").await,
            InstanceState::Running
        );
    }

    #[tokio::test]
    async fn state_not_found_when_describe_fails() {
        let provider = ProviderStub::new(ok_output(b"{}"), vec![fail_output(b"does not exist")]);
        assert_eq!(
            state(&provider, "i-0a1b2c3d4e5f67890").await,
            InstanceState::NotFound
        );
    }

    #[tokio::test]
    async fn state_not_found_when_describe_output_is_garbled() {
        let provider = ProviderStub::new(ok_output(b"{}"), vec![ok_output(b"<html>503</html>")]);
        assert_eq!(
            state(&provider, "i-0a1b2c3d4e5f67890").await,
            InstanceState::NotFound
        );
    }

    #[tokio::test]
    async fn wait_for_state_retries_past_a_garbled_describe_response() {
        let provider = ProviderStub::new(
            ok_output(b"{}"),
            vec![
                ok_output(b"<html>503</html>"),
                ok_output(&describe_json("running")),
            ],
        );
        wait_for_state(
            &provider,
            "i-0a1b2c3d4e5f67890",
            InstanceState::Running,
            RetryPolicy::new(3, Duration::ZERO),
        )
        .await
        .expect("garbled response must be retried, not fatal");
    }

    #[tokio::test]
    async fn launch_returns_instance_id_once_running() {
        let provider = ProviderStub::new(
            ok_output(RUN_INSTANCES_JSON),
            vec![
                ok_output(&describe_json("pending")),
                ok_output(&describe_json("running")),
            ],
        );
        let spec = LaunchSpec {
            image_id: "ami-0abcdef1234567890",
            instance_type: "t3.micro",
            key_name: "bakery",
            security_groups: &[],
            user_data: None,
        };
        // STATE_POLICY sleeps 15s between polls; run under a paused clock.
        tokio::time::pause();
        let id = launch(&provider, &spec, &ReporterStub).await.expect("launch");
        assert_eq!(id, "i-0a1b2c3d4e5f67890");
        assert_eq!(provider.run_calls.get(), 1);
    }

    #[tokio::test]
    async fn launch_surfaces_provider_stderr_on_failure() {
        let provider = ProviderStub::new(
            fail_output(b"UnauthorizedOperation"),
            vec![ok_output(&describe_json("running"))],
        );
        let spec = LaunchSpec {
            image_id: "ami-0abcdef1234567890",
            instance_type: "t3.micro",
            key_name: "bakery",
            security_groups: &[],
            user_data: None,
        };
        let err = launch(&provider, &spec, &ReporterStub)
            .await
            .expect_err("expected launch failure");
        assert!(err.to_string().contains("UnauthorizedOperation"));
    }

    #[tokio::test]
    async fn wait_for_state_times_out_rather_than_silently_succeeding() {
        let provider =
            ProviderStub::new(ok_output(b"{}"), vec![ok_output(&describe_json("pending"))]);
        let err = wait_for_state(
            &provider,
            "i-0a1b2c3d4e5f67890",
            InstanceState::Running,
            RetryPolicy::new(3, Duration::ZERO),
        )
        .await
        .expect_err("expected timeout");
        let exhausted = err
            .downcast_ref::<RetriesExhausted>()
            .expect("expected RetriesExhausted");
        assert_eq!(exhausted.attempts, 3);
    }

    #[tokio::test]
    async fn stop_waits_for_stopped_state() {
        let provider = ProviderStub::new(
            ok_output(b"{}"),
            vec![
                ok_output(&describe_json("stopping")),
                ok_output(&describe_json("stopped")),
            ],
        );
        tokio::time::pause();
        stop(&provider, "i-0a1b2c3d4e5f67890", &ReporterStub)
            .await
            .expect("stop");
        assert_eq!(provider.stop_calls.get(), 1);
    }

    #[tokio::test]
    async fn terminate_waits_for_terminated_state() {
        let provider = ProviderStub::new(
            ok_output(b"{}"),
            vec![
                ok_output(&describe_json("shutting-down")),
                ok_output(&describe_json("terminated")),
            ],
        );
        tokio::time::pause();
        terminate(&provider, "i-0a1b2c3d4e5f67890", &ReporterStub)
            .await
            .expect("terminate");
        assert_eq!(provider.terminate_calls.get(), 1);
    }

    #[tokio::test]
    async fn public_dns_resolves() {
        let provider =
            ProviderStub::new(ok_output(b"{}"), vec![ok_output(&describe_json("running"))]);
        let dns = public_dns(&provider, "i-0a1b2c3d4e5f67890")
            .await
            .expect("public_dns");
        assert_eq!(dns, "ec2-198-51-100-1.compute-1.amazonaws.com");
    }

    #[tokio::test]
    async fn public_dns_missing_is_an_error() {
        let provider = ProviderStub::new(
            ok_output(b"{}"),
            vec![ok_output(
                br#"{"Reservations":[{"Instances":[{"InstanceId":"i-0a1b2c3d4e5f67890","PublicDnsName":""}]}]}"#,
            )],
        );
        let err = public_dns(&provider, "i-0a1b2c3d4e5f67890")
            .await
            .expect_err("expected missing DNS error");
        assert!(err.to_string().contains("no public DNS"), "{err}");
    }

    struct VersionStub(&'static [u8]);
    impl InstanceInspector for VersionStub {
        async fn describe_instance(&self, _: &str) -> Result<Output> {
            anyhow::bail!("not expected")
        }
        async fn cli_version(&self) -> Result<Output> {
            Ok(ok_output(self.0))
        }
    }

    #[tokio::test]
    async fn prerequisites_accept_current_cli() {
        let inspector = VersionStub(b"aws-cli/2.15.30 Python/3.11.8");
        assert!(check_prerequisites(&inspector).await.is_ok());
    }

    #[tokio::test]
    async fn prerequisites_reject_old_cli() {
        let inspector = VersionStub(b"aws-cli/1.29.0 Python/3.9.1");
        let err = check_prerequisites(&inspector)
            .await
            .expect_err("expected version error");
        assert!(err.to_string().contains("too old"), "{err}");
    }
}
