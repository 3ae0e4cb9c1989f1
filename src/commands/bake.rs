//! `kiln bake` — launch, bootstrap, converge, and snapshot in one pass.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::bake::{self, BakeOptions};
use crate::commands::launch::LaunchArgs;

/// Arguments for the bake command.
#[derive(Args)]
pub struct BakeArgs {
    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Directory holding solo.rb, dna.json, and the cookbooks
    #[arg(long)]
    pub recipes: PathBuf,

    /// Image name
    #[arg(long)]
    pub name: String,

    /// Image description
    #[arg(long, default_value = "baked by kiln")]
    pub description: String,

    /// Leave the instance running after the snapshot
    #[arg(long)]
    pub keep: bool,
}

/// Run `kiln bake`.
///
/// # Errors
///
/// Returns an error if any phase of the pipeline fails.
pub async fn run(args: &BakeArgs, app: &AppContext) -> Result<()> {
    anyhow::ensure!(
        args.recipes.is_dir(),
        "recipe directory {} not found",
        args.recipes.display()
    );
    let user_data = args.launch.user_data_path()?;
    let spec = args.launch.spec(&user_data);

    let outcome = bake::bake(
        &app.provider,
        &app.ssh,
        &app.store,
        BakeOptions {
            spec: &spec,
            recipes: &args.recipes,
            image_name: &args.name,
            image_description: &args.description,
            keep_running: args.keep,
        },
        &app.reporter(),
    )
    .await?;

    app.output.kv("Instance", &outcome.instance_id);
    app.output.kv("Image", &outcome.image_id);
    Ok(())
}
