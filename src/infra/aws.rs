//! Infrastructure implementation of the cloud provider port traits.
//!
//! `AwsCliProvisioner<R>` routes every provider call through a
//! `CommandRunner` driving the `aws` CLI with `--output json`. Generic
//! over `R: CommandRunner` so tests can inject a mock runner without
//! spawning real processes.

use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{ImageBaker, InstanceInspector, InstanceLifecycle, LaunchSpec};
use crate::command_runner::{CommandRunner, DEFAULT_CMD_TIMEOUT, TokioCommandRunner};

pub struct AwsCliProvisioner<R: CommandRunner> {
    runner: R,
    region: Option<String>,
}

impl<R: CommandRunner> AwsCliProvisioner<R> {
    /// Create a provisioner with an explicit runner instance.
    ///
    /// When `region` is `None` the CLI falls back to its own configured
    /// default region.
    pub fn new(runner: R, region: Option<String>) -> Self {
        Self { runner, region }
    }

    async fn ec2(&self, args: &[&str]) -> Result<Output> {
        let mut full: Vec<&str> = vec!["ec2"];
        full.extend_from_slice(args);
        if let Some(region) = &self.region {
            full.push("--region");
            full.push(region);
        }
        full.push("--output");
        full.push("json");
        self.runner.run("aws", &full).await
    }
}

impl AwsCliProvisioner<TokioCommandRunner> {
    /// Convenience constructor for production use.
    #[must_use]
    pub fn default_runner(region: Option<String>) -> Self {
        Self {
            runner: TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT),
            region,
        }
    }
}

impl<R: CommandRunner> InstanceLifecycle for AwsCliProvisioner<R> {
    async fn run_instance(&self, spec: &LaunchSpec<'_>) -> Result<Output> {
        let mut args = vec![
            "run-instances",
            "--image-id",
            spec.image_id,
            "--instance-type",
            spec.instance_type,
            "--key-name",
            spec.key_name,
            "--count",
            "1",
        ];
        if !spec.security_groups.is_empty() {
            args.push("--security-groups");
            for group in spec.security_groups {
                args.push(group);
            }
        }
        let user_data_arg;
        if let Some(path) = spec.user_data {
            user_data_arg = format!("file://{path}");
            args.push("--user-data");
            args.push(&user_data_arg);
        }
        self.ec2(&args).await.context("aws ec2 run-instances")
    }

    async fn stop_instance(&self, id: &str) -> Result<Output> {
        self.ec2(&["stop-instances", "--instance-ids", id])
            .await
            .context("aws ec2 stop-instances")
    }

    async fn terminate_instance(&self, id: &str) -> Result<Output> {
        self.ec2(&["terminate-instances", "--instance-ids", id])
            .await
            .context("aws ec2 terminate-instances")
    }
}

impl<R: CommandRunner> InstanceInspector for AwsCliProvisioner<R> {
    async fn describe_instance(&self, id: &str) -> Result<Output> {
        self.ec2(&["describe-instances", "--instance-ids", id])
            .await
            .context("aws ec2 describe-instances")
    }

    async fn cli_version(&self) -> Result<Output> {
        self.runner
            .run("aws", &["--version"])
            .await
            .context("aws --version")
    }
}

impl<R: CommandRunner> ImageBaker for AwsCliProvisioner<R> {
    async fn create_image(&self, id: &str, name: &str, description: &str) -> Result<Output> {
        self.ec2(&[
            "create-image",
            "--instance-id",
            id,
            "--name",
            name,
            "--description",
            description,
        ])
        .await
        .context("aws ec2 create-image")
    }

    async fn describe_image(&self, image_id: &str) -> Result<Output> {
        self.ec2(&["describe-images", "--image-ids", image_id])
            .await
            .context("aws ec2 describe-images")
    }
}
