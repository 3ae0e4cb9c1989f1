//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`. All error
//! types implement `thiserror::Error` and convert to `anyhow::Error` via
//! the `?` operator.
//!
//! The two terminal provisioning failure kinds are [`RetriesExhausted`]
//! (a wait or retried operation ran out of budget) and
//! [`crate::domain::job::BatchError`] (a remote command exited non-zero).

use thiserror::Error;

// ── Provisioning errors ───────────────────────────────────────────────────────

/// A retried operation or wait-predicate never succeeded within budget.
#[derive(Debug, Error)]
#[error("gave up {what} after {attempts} attempts: {last_error}")]
pub struct RetriesExhausted {
    pub what: String,
    pub attempts: u32,
    pub last_error: String,
}

// ── Instance errors ───────────────────────────────────────────────────────────

/// Errors related to instance identity and resolution.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("No instance on record. Run 'kiln launch' first, or pass --instance-id.")]
    NotFound,

    #[error("Invalid instance ID: {0}")]
    InvalidId(String),

    #[error("Instance {0} has no public DNS name yet.")]
    NoPublicDns(String),
}
