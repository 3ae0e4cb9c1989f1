//! `kiln terminate` — terminate the instance permanently.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::InstanceStore as _;
use crate::application::services::lifecycle;
use crate::commands::TargetArgs;

/// Run `kiln terminate`.
///
/// Asks for confirmation unless running non-interactively. The local
/// instance record is cleared once the instance is gone.
///
/// # Errors
///
/// Returns an error if the instance cannot be resolved, the prompt fails,
/// or the instance never reaches the terminated state.
pub async fn run(args: &TargetArgs, app: &AppContext) -> Result<()> {
    let id = app.resolve_instance_id(args.instance_id.as_deref()).await?;

    let confirmed = app.confirm(
        &format!("Terminate instance {id}? This cannot be undone."),
        true,
    )?;
    if !confirmed {
        app.output.info("Terminate cancelled.");
        return Ok(());
    }

    lifecycle::terminate(&app.provider, &id, &app.reporter()).await?;

    // Only forget the record if it pointed at the instance we just removed.
    if let Some(record) = app.store.load_async().await?
        && record.instance_id == id
    {
        app.store.forget()?;
    }
    Ok(())
}
