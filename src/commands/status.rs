//! `kiln status` — show instance state and addresses.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::InstanceStore as _;
use crate::application::services::lifecycle;
use crate::commands::TargetArgs;
use crate::domain::instance::InstanceState;
use crate::output::progress;

/// Run `kiln status`.
///
/// # Errors
///
/// Returns an error if the instance cannot be resolved.
pub async fn run(args: &TargetArgs, app: &AppContext, json: bool) -> Result<()> {
    let id = app.resolve_instance_id(args.instance_id.as_deref()).await?;
    let record = app.store.load_async().await?.filter(|r| r.instance_id == id);

    let pb = app
        .output
        .show_progress()
        .then(|| progress::spinner("querying instance..."));
    let state = lifecycle::state(&app.provider, &id).await;
    let dns = if state == InstanceState::Running {
        lifecycle::public_dns(&app.provider, &id).await.ok()
    } else {
        None
    };
    if let Some(pb) = pb {
        progress::finish_clear(&pb);
    }

    if json {
        let payload = serde_json::json!({
            "instance_id": id,
            "state": state.display(),
            "public_dns": dns,
            "launched_at": record.as_ref().map(|r| r.launched_at),
            "last_image_id": record.as_ref().and_then(|r| r.last_image_id.clone()),
        });
        println!("{payload}");
        return Ok(());
    }

    app.output.kv("Instance", &id);
    app.output.kv("State", state.display());
    if let Some(dns) = dns {
        app.output.kv("Public DNS", &dns);
    }
    if let Some(record) = record {
        app.output
            .kv("Launched", &record.launched_at.to_rfc3339());
        if let Some(image_id) = record.last_image_id {
            app.output.kv("Last image", &image_id);
        }
    }
    Ok(())
}
