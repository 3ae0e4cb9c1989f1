//! The full bake pipeline: launch, bootstrap, converge, snapshot.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::application::ports::{
    CloudProvider, FileSync, InstanceStore, LaunchSpec, ProgressReporter, RemoteShell,
};
use crate::application::services::{bootstrap, converge, image, lifecycle};
use crate::domain::instance::InstanceRecord;

/// Inputs for one bake run.
pub struct BakeOptions<'a> {
    pub spec: &'a LaunchSpec<'a>,
    pub recipes: &'a Path,
    pub image_name: &'a str,
    pub image_description: &'a str,
    /// Leave the instance running after the snapshot instead of stopping it.
    pub keep_running: bool,
}

/// Outcome of a completed bake.
#[derive(Debug)]
pub struct BakeOutcome {
    pub instance_id: String,
    pub image_id: String,
}

/// Launch an instance, bootstrap and converge it, snapshot the result,
/// then stop the instance unless asked to keep it.
///
/// The instance record is persisted right after launch so a failed bake
/// leaves the instance addressable by follow-up commands (`kiln status`,
/// `kiln terminate`).
///
/// # Errors
///
/// Returns an error if any phase of the pipeline fails.
pub async fn bake(
    provider: &impl CloudProvider,
    shell: &(impl RemoteShell + FileSync),
    store: &impl InstanceStore,
    opts: BakeOptions<'_>,
    reporter: &impl ProgressReporter,
) -> Result<BakeOutcome> {
    let instance_id = lifecycle::launch(provider, opts.spec, reporter).await?;
    store
        .save_async(&InstanceRecord {
            instance_id: instance_id.clone(),
            launched_at: Utc::now(),
            last_image_id: None,
        })
        .await
        .context("persisting instance record")?;

    let host = lifecycle::public_dns(provider, &instance_id).await?;
    bootstrap::bootstrap(shell, &host, reporter).await?;
    converge::converge(shell, &host, opts.recipes, reporter).await?;

    let image_id = image::snapshot(
        provider,
        &instance_id,
        opts.image_name,
        opts.image_description,
        reporter,
    )
    .await?;
    store
        .save_async(&InstanceRecord {
            instance_id: instance_id.clone(),
            launched_at: Utc::now(),
            last_image_id: Some(image_id.clone()),
        })
        .await
        .context("persisting image id")?;

    if !opts.keep_running {
        lifecycle::stop(provider, &instance_id, reporter).await?;
    }

    Ok(BakeOutcome {
        instance_id,
        image_id,
    })
}
