//! Instance domain types and pure validation functions.
//!
//! This module is intentionally free of I/O, async, and external layer
//! imports. All functions take data in and return data out.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::InstanceError;

/// Instance state as reported by the provider.
///
/// `NotFound` covers both an instance the provider does not know about and
/// a describe response that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    NotFound,
}

impl InstanceState {
    /// Parse a provider state name (e.g. `"running"`).
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            _ => Self::NotFound,
        }
    }

    /// Display string for human and JSON output.
    #[must_use]
    pub fn display(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::NotFound => "not-found",
        }
    }
}

/// Instance record persisted to `~/.kiln/state.json`.
///
/// Kiln never owns the remote instance; this record only remembers which
/// instance the last `kiln launch` produced so follow-up commands can omit
/// `--instance-id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Provider-assigned instance identifier (e.g. "i-0a1b2c3d4e5f67890").
    pub instance_id: String,
    /// When the instance was launched.
    pub launched_at: DateTime<Utc>,
    /// Image id produced by the most recent snapshot, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_image_id: Option<String>,
}

/// Validates instance ID format.
///
/// A valid instance ID is `i-` followed by 8 or 17 lowercase hex characters.
///
/// # Errors
///
/// Returns an error if the ID doesn't match the expected format.
pub fn validate_instance_id(id: &str) -> Result<()> {
    let Some(hex) = id.strip_prefix("i-") else {
        return Err(InstanceError::InvalidId(id.to_string()).into());
    };
    if hex.len() != 8 && hex.len() != 17 {
        return Err(InstanceError::InvalidId(id.to_string()).into());
    }
    if !hex
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        return Err(InstanceError::InvalidId(id.to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_states() {
        assert_eq!(InstanceState::parse("pending"), InstanceState::Pending);
        assert_eq!(InstanceState::parse("running"), InstanceState::Running);
        assert_eq!(InstanceState::parse("stopping"), InstanceState::Stopping);
        assert_eq!(InstanceState::parse("stopped"), InstanceState::Stopped);
        assert_eq!(
            InstanceState::parse("shutting-down"),
            InstanceState::ShuttingDown
        );
        assert_eq!(
            InstanceState::parse("terminated"),
            InstanceState::Terminated
        );
    }

    #[test]
    fn parse_unknown_state_is_not_found() {
        assert_eq!(InstanceState::parse("rebooting"), InstanceState::NotFound);
        assert_eq!(InstanceState::parse(""), InstanceState::NotFound);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for state in [
            InstanceState::Pending,
            InstanceState::Running,
            InstanceState::Stopping,
            InstanceState::Stopped,
            InstanceState::ShuttingDown,
            InstanceState::Terminated,
        ] {
            assert_eq!(InstanceState::parse(state.display()), state);
        }
    }

    #[test]
    fn valid_long_instance_id() {
        assert!(validate_instance_id("i-0a1b2c3d4e5f67890").is_ok());
    }

    #[test]
    fn valid_short_instance_id() {
        assert!(validate_instance_id("i-12345678").is_ok());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(validate_instance_id("0a1b2c3d4e5f67890").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate_instance_id("i-123").is_err());
        assert!(validate_instance_id("i-0a1b2c3d4e5f678901234").is_err());
    }

    #[test]
    fn rejects_non_hex_and_uppercase() {
        assert!(validate_instance_id("i-0a1b2c3d4e5f6789z").is_err());
        assert!(validate_instance_id("i-0A1B2C3D4E5F67890").is_err());
    }

    #[test]
    fn record_json_omits_absent_image_id() {
        let record = InstanceRecord {
            instance_id: "i-12345678".to_string(),
            launched_at: Utc::now(),
            last_image_id: None,
        };
        let json = serde_json::to_string(&record).expect("serialize record");
        assert!(!json.contains("last_image_id"));
    }
}
