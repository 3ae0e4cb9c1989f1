//! `kiln snapshot` — create a machine image from the instance.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::InstanceStore as _;
use crate::application::services::image;
use crate::commands::TargetArgs;
use crate::domain::instance::InstanceRecord;

/// Arguments for the snapshot command.
#[derive(Args)]
pub struct SnapshotArgs {
    /// Image name
    #[arg(long)]
    pub name: String,

    /// Image description
    #[arg(long, default_value = "")]
    pub description: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Run `kiln snapshot`.
///
/// # Errors
///
/// Returns an error if the instance cannot be resolved or the image never
/// becomes available.
pub async fn run(args: &SnapshotArgs, app: &AppContext) -> Result<()> {
    let id = app
        .resolve_instance_id(args.target.instance_id.as_deref())
        .await?;
    let image_id = image::snapshot(
        &app.provider,
        &id,
        &args.name,
        &args.description,
        &app.reporter(),
    )
    .await?;

    let record = app
        .store
        .load_async()
        .await?
        .filter(|r| r.instance_id == id)
        .map_or_else(
            || InstanceRecord {
                instance_id: id.clone(),
                launched_at: Utc::now(),
                last_image_id: Some(image_id.clone()),
            },
            |mut r| {
                r.last_image_id = Some(image_id.clone());
                r
            },
        );
    app.store
        .save_async(&record)
        .await
        .context("persisting image id")?;

    app.output.kv("Image", &image_id);
    Ok(())
}
