//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, ConnectionFlags, OutputFlags};
use crate::commands;

/// Launch, provision, and bake single cloud instances
#[derive(Parser)]
#[command(
    name = "kiln",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format (status, version)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Skip interactive prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Provider region (defaults to the AWS CLI's configured region)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// SSH login user on the instance
    #[arg(long, global = true, env = "KILN_SSH_USER", default_value = "ubuntu")]
    pub ssh_user: String,

    /// Path to the SSH private key matching the launch key pair
    #[arg(short = 'i', long, global = true, env = "KILN_IDENTITY")]
    pub identity: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Launch an instance and wait until it is running
    Launch(commands::launch::LaunchArgs),

    /// Wait for SSH, install prerequisites and chef
    Bootstrap(commands::TargetArgs),

    /// Upload recipes and run chef-solo
    Converge(commands::converge::ConvergeArgs),

    /// Launch, bootstrap, converge, and snapshot in one pass
    Bake(commands::bake::BakeArgs),

    /// Create a machine image from the instance
    Snapshot(commands::snapshot::SnapshotArgs),

    /// Stop the instance (preserves its disk)
    Stop(commands::TargetArgs),

    /// Terminate the instance permanently
    Terminate(commands::TargetArgs),

    /// Show instance state and addresses
    Status(commands::TargetArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            region,
            ssh_user,
            identity,
            command,
        } = self;

        if let Command::Version = command {
            commands::version::run(json);
            return Ok(());
        }

        let app = AppContext::new(AppFlags {
            output: OutputFlags { no_color, quiet },
            behaviour: BehaviourFlags { yes },
            connection: ConnectionFlags {
                region,
                ssh_user,
                identity,
            },
        })?;

        match command {
            Command::Launch(args) => commands::launch::run(&args, &app).await,
            Command::Bootstrap(args) => commands::bootstrap::run(&args, &app).await,
            Command::Converge(args) => commands::converge::run(&args, &app).await,
            Command::Bake(args) => commands::bake::run(&args, &app).await,
            Command::Snapshot(args) => commands::snapshot::run(&args, &app).await,
            Command::Stop(args) => commands::stop::run(&args, &app).await,
            Command::Terminate(args) => commands::terminate::run(&args, &app).await,
            Command::Status(args) => commands::status::run(&args, &app, json).await,
            Command::Version => unreachable!("handled above"),
        }
    }
}
