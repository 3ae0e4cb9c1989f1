//! Command handlers — thin: parse flags, call an application service,
//! render the outcome.

pub mod bake;
pub mod bootstrap;
pub mod converge;
pub mod launch;
pub mod snapshot;
pub mod status;
pub mod stop;
pub mod terminate;
pub mod version;

use clap::Args;

/// Target selection shared by instance-scoped commands.
#[derive(Args, Default)]
pub struct TargetArgs {
    /// Instance to target (defaults to the last launched instance)
    #[arg(long)]
    pub instance_id: Option<String>,
}
