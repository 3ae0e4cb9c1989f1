//! Machine image snapshots: create an image from an instance and wait
//! until the provider reports it available.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::application::ports::{ImageBaker, ProgressReporter};
use crate::application::retry::{self, RetryPolicy};

/// Polling budget for image availability (15 minutes; image creation from
/// a live instance routinely takes several).
const AVAILABLE_POLICY: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(15));

/// Create a machine image from `id` and block until it is available.
///
/// Returns the provider-assigned image id.
///
/// # Errors
///
/// Returns an error if the create call fails, the response carries no
/// image id, the provider reports the image failed, or the image never
/// becomes available within budget.
pub async fn snapshot(
    provider: &impl ImageBaker,
    id: &str,
    name: &str,
    description: &str,
    reporter: &impl ProgressReporter,
) -> Result<String> {
    snapshot_with(AVAILABLE_POLICY, provider, id, name, description, reporter).await
}

pub(crate) async fn snapshot_with(
    policy: RetryPolicy,
    provider: &impl ImageBaker,
    id: &str,
    name: &str,
    description: &str,
    reporter: &impl ProgressReporter,
) -> Result<String> {
    reporter.step(&format!("creating image '{name}' from {id}..."));
    let output = provider
        .create_image(id, name, description)
        .await
        .context("creating image")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("failed to create image from {id}:\n{stderr}");
    }
    let image_id = parse_image_id(&output.stdout)?;

    reporter.step(&format!("waiting for image {image_id} to become available..."));
    retry::wait_until(
        policy,
        &format!("waiting for image {image_id} to become available"),
        async || image_available(provider, &image_id).await,
    )
    .await?;
    reporter.success(&format!("image {image_id} available"));
    Ok(image_id)
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Probe image state. A failed describe maps to "keep polling" because
/// image registration can lag behind the create-image response; a
/// provider-reported `failed` state is fatal.
async fn image_available(provider: &impl ImageBaker, image_id: &str) -> Result<bool> {
    let output = provider
        .describe_image(image_id)
        .await
        .context("describing image")?;
    if !output.status.success() {
        return Ok(false);
    }
    let info: Value =
        serde_json::from_slice(&output.stdout).context("parsing describe-images output")?;
    let state = info
        .get("Images")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|i| i.get("State"))
        .and_then(|s| s.as_str())
        .unwrap_or("pending");
    match state {
        "available" => Ok(true),
        "failed" => anyhow::bail!("provider reported image {image_id} failed"),
        _ => Ok(false),
    }
}

fn parse_image_id(stdout: &[u8]) -> Result<String> {
    let response: Value = serde_json::from_slice(stdout).context("parsing create-image output")?;
    response
        .get("ImageId")
        .and_then(|s| s.as_str())
        .map(String::from)
        .ok_or_else(|| anyhow::anyhow!("no image id in create-image output"))
}
