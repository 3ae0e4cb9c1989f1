//! `kiln launch` — launch an instance and wait until it is running.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::{InstanceStore as _, LaunchSpec};
use crate::application::services::lifecycle;
use crate::domain::instance::InstanceRecord;

/// Arguments for the launch command.
#[derive(Args)]
pub struct LaunchArgs {
    /// Machine image to launch
    #[arg(long, env = "KILN_IMAGE_ID")]
    pub image_id: String,

    /// Instance type
    #[arg(long, env = "KILN_INSTANCE_TYPE", default_value = "t3.micro")]
    pub instance_type: String,

    /// Key pair installed for SSH access
    #[arg(long, env = "KILN_KEY_NAME")]
    pub key_name: String,

    /// Security group to attach (repeatable)
    #[arg(long = "security-group")]
    pub security_groups: Vec<String>,

    /// Local user-data file passed to the instance at boot
    #[arg(long)]
    pub user_data: Option<PathBuf>,
}

impl LaunchArgs {
    /// Build the launch spec from the parsed flags.
    #[must_use]
    pub fn spec<'a>(&'a self, user_data: &'a Option<String>) -> LaunchSpec<'a> {
        LaunchSpec {
            image_id: &self.image_id,
            instance_type: &self.instance_type,
            key_name: &self.key_name,
            security_groups: &self.security_groups,
            user_data: user_data.as_deref(),
        }
    }

    /// Validate and stringify the user-data path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a file or not valid UTF-8.
    pub fn user_data_path(&self) -> Result<Option<String>> {
        match &self.user_data {
            None => Ok(None),
            Some(path) => {
                anyhow::ensure!(path.is_file(), "user-data file {} not found", path.display());
                let s = path
                    .to_str()
                    .context("user-data path is not valid UTF-8")?
                    .to_string();
                Ok(Some(s))
            }
        }
    }
}

/// Run `kiln launch`.
///
/// # Errors
///
/// Returns an error if the launch fails or the instance never reaches the
/// running state.
pub async fn run(args: &LaunchArgs, app: &AppContext) -> Result<()> {
    let user_data = args.user_data_path()?;
    let spec = args.spec(&user_data);
    let reporter = app.reporter();

    let instance_id = lifecycle::launch(&app.provider, &spec, &reporter).await?;
    app.store
        .save_async(&InstanceRecord {
            instance_id: instance_id.clone(),
            launched_at: Utc::now(),
            last_image_id: None,
        })
        .await
        .context("persisting instance record")?;

    app.output.kv("Instance", &instance_id);
    app.output.kv("Bootstrap", "kiln bootstrap");
    app.output.kv("Status", "kiln status");
    Ok(())
}
