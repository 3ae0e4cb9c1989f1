//! `kiln converge` — upload recipes and run chef-solo.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::{converge, lifecycle};
use crate::commands::TargetArgs;

/// Arguments for the converge command.
#[derive(Args)]
pub struct ConvergeArgs {
    /// Directory holding solo.rb, dna.json, and the cookbooks
    #[arg(long)]
    pub recipes: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Run `kiln converge`.
///
/// # Errors
///
/// Returns an error if the recipe directory is missing, the instance
/// cannot be resolved, or the convergence run fails.
pub async fn run(args: &ConvergeArgs, app: &AppContext) -> Result<()> {
    anyhow::ensure!(
        args.recipes.is_dir(),
        "recipe directory {} not found",
        args.recipes.display()
    );
    let id = app
        .resolve_instance_id(args.target.instance_id.as_deref())
        .await?;
    let host = lifecycle::public_dns(&app.provider, &id).await?;
    converge::converge(&app.ssh, &host, &args.recipes, &app.reporter()).await
}
