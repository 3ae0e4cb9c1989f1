//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::instance::InstanceRecord;

// ── Value Types ───────────────────────────────────────────────────────────────

/// Launch parameters for creating a new instance.
pub struct LaunchSpec<'a> {
    /// Machine image to launch, e.g. `"ami-0abcdef1234567890"`.
    pub image_id: &'a str,
    /// Instance type, e.g. `"t3.micro"`.
    pub instance_type: &'a str,
    /// Name of the key pair installed for SSH access.
    pub key_name: &'a str,
    /// Security group names to attach.
    pub security_groups: &'a [String],
    /// Optional path to a local user-data file passed at boot.
    pub user_data: Option<&'a str>,
}

// ── Provider Port Traits ──────────────────────────────────────────────────────

/// Instance lifecycle operations: create, stop, destroy.
#[allow(async_fn_in_trait)]
pub trait InstanceLifecycle {
    /// Launch a new instance with the given spec.
    async fn run_instance(&self, spec: &LaunchSpec<'_>) -> Result<Output>;
    /// Stop a running instance.
    async fn stop_instance(&self, id: &str) -> Result<Output>;
    /// Terminate an instance permanently.
    async fn terminate_instance(&self, id: &str) -> Result<Output>;
}

/// Instance state inspection.
#[allow(async_fn_in_trait)]
pub trait InstanceInspector {
    /// Describe one instance as JSON.
    async fn describe_instance(&self, id: &str) -> Result<Output>;
    /// Get the provider CLI version line.
    async fn cli_version(&self) -> Result<Output>;
}

/// Machine image creation and inspection.
#[allow(async_fn_in_trait)]
pub trait ImageBaker {
    /// Create a machine image from the given instance.
    async fn create_image(&self, id: &str, name: &str, description: &str) -> Result<Output>;
    /// Describe one image as JSON.
    async fn describe_image(&self, image_id: &str) -> Result<Output>;
}

/// Composite trait — any type implementing all three sub-traits is a
/// `CloudProvider`.
pub trait CloudProvider: InstanceLifecycle + InstanceInspector + ImageBaker {}

/// Blanket implementation for the composite trait.
impl<T> CloudProvider for T where T: InstanceLifecycle + InstanceInspector + ImageBaker {}

// ── Transport Port Traits ─────────────────────────────────────────────────────

/// Command execution on the instance over SSH.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Execute a shell command on `host` and capture its output.
    async fn exec(&self, host: &str, command: &str) -> Result<Output>;
    /// Execute a shell command with a per-attempt transport timeout.
    async fn exec_with_timeout(
        &self,
        host: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<Output>;
}

/// Local-to-instance file transfer.
#[allow(async_fn_in_trait)]
pub trait FileSync {
    /// Recursively copy the *contents* of `local` into `remote` on `host`.
    ///
    /// A trailing path separator on `local` must not change the outcome.
    async fn upload_dir(&self, host: &str, local: &Path, remote: &str) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── State Port ────────────────────────────────────────────────────────────────

/// Abstracts instance record persistence (load/save).
#[allow(async_fn_in_trait)]
pub trait InstanceStore {
    /// Load the remembered instance record, returning `None` if no record
    /// exists.
    async fn load_async(&self) -> Result<Option<InstanceRecord>>;
    /// Persist the given instance record.
    async fn save_async(&self, record: &InstanceRecord) -> Result<()>;
}
