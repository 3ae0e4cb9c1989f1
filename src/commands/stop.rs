//! `kiln stop` — stop the instance, preserving its disk.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::lifecycle;
use crate::commands::TargetArgs;

/// Run `kiln stop`.
///
/// # Errors
///
/// Returns an error if the instance cannot be resolved or never reaches
/// the stopped state.
pub async fn run(args: &TargetArgs, app: &AppContext) -> Result<()> {
    let id = app.resolve_instance_id(args.instance_id.as_deref()).await?;
    lifecycle::stop(&app.provider, &id, &app.reporter()).await?;
    app.output.kv("Resume", "kiln status");
    Ok(())
}
