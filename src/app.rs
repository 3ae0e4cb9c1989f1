//! Application context — unified state passed to every command handler.
//!
//! `AppContext` is constructed once in `Cli::run()` and passed as
//! `&AppContext` to all command handlers. Adding a new cross-cutting
//! concern requires only one field change here — zero command signatures
//! change.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::InstanceStore as _;
use crate::command_runner::TokioCommandRunner;
use crate::domain::error::InstanceError;
use crate::domain::instance::validate_instance_id;
use crate::infra::aws::AwsCliProvisioner;
use crate::infra::ssh::OpenSshClient;
use crate::infra::state::StateFile;
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `KILN_YES` env vars).
    pub yes: bool,
}

/// Provider and transport flags.
pub struct ConnectionFlags {
    /// Provider region override; `None` uses the CLI's configured default.
    pub region: Option<String>,
    /// SSH login user on the instance.
    pub ssh_user: String,
    /// Path to the SSH private key matching the launch key pair.
    pub identity: Option<PathBuf>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
    pub connection: ConnectionFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Cloud provider adapter.
    pub provider: AwsCliProvisioner<TokioCommandRunner>,
    /// SSH transport adapter.
    pub ssh: OpenSshClient<TokioCommandRunner>,
    /// Instance record store.
    pub store: StateFile,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `KILN_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be resolved (home
    /// directory not found).
    pub fn new(flags: AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("KILN_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            provider: AwsCliProvisioner::default_runner(flags.connection.region),
            ssh: OpenSshClient::default_runner(flags.connection.ssh_user, flags.connection.identity),
            store: StateFile::open_default()?,
            non_interactive,
        })
    }

    /// Progress reporter bound to this context's output settings.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Resolve the instance to operate on: an explicit `--instance-id`
    /// wins, otherwise the remembered record from the last launch.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit id is malformed, or no id was given
    /// and no record exists.
    pub async fn resolve_instance_id(&self, flag: Option<&str>) -> Result<String> {
        if let Some(id) = flag {
            validate_instance_id(id)?;
            return Ok(id.to_string());
        }
        self.store
            .load_async()
            .await?
            .map(|record| record.instance_id)
            .ok_or_else(|| InstanceError::NotFound.into())
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `KILN_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
