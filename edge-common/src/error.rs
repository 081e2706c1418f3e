//! Foundational error types shared across the Edge Robot Command Service.
//!
//! Each subsystem crate (`edge-queue`, `edge-worker`, `edge-coordinator`,
//! `edge-offline`, `edge-batch`) defines its own `thiserror` enum for its
//! domain; this module holds only the handful of error shapes common to
//! all of them -- chiefly configuration validation.

use thiserror::Error;

/// Errors that can occur while validating a subsystem's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field is missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value is out of its valid range or otherwise malformed.
    #[error("invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// Failed to parse the configuration document itself.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
