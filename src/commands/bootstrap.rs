//! `kiln bootstrap` — wait for SSH, install prerequisites and chef.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::{bootstrap, lifecycle};
use crate::commands::TargetArgs;

/// Run `kiln bootstrap`.
///
/// # Errors
///
/// Returns an error if the instance cannot be resolved or any bootstrap
/// phase fails.
pub async fn run(args: &TargetArgs, app: &AppContext) -> Result<()> {
    let id = app.resolve_instance_id(args.instance_id.as_deref()).await?;
    let host = lifecycle::public_dns(&app.provider, &id).await?;
    bootstrap::bootstrap(&app.ssh, &host, &app.reporter()).await
}
