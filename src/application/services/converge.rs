//! Convergence: upload chef recipes and run chef-solo on the instance.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{FileSync, ProgressReporter, RemoteShell};
use crate::application::services::bootstrap::run_checked;

/// Where recipes land on the instance.
pub const CHEF_SOLO_DIR: &str = "/tmp/chef-solo";

const CONVERGE_COMMAND: &str = "cd /tmp/chef-solo && sudo chef-solo -c solo.rb -j dna.json";

/// Upload the contents of `recipes` to the instance and run chef-solo.
///
/// # Errors
///
/// Returns an error if the upload fails or the convergence run exits
/// non-zero.
pub async fn converge(
    shell: &(impl RemoteShell + FileSync),
    host: &str,
    recipes: &Path,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("uploading chef recipes...");
    let output = shell
        .upload_dir(host, recipes, CHEF_SOLO_DIR)
        .await
        .context("uploading recipes")?;
    anyhow::ensure!(
        output.status.success(),
        "recipe upload failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    reporter.step("converging instance, this may take a while (10-20 minutes)...");
    run_checked(shell, host, CONVERGE_COMMAND).await?;
    reporter.success("instance converged");
    Ok(())
}
