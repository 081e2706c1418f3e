//! Coordinator error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("service {0} is not registered")]
    NotFound(String),

    #[error("service {0} is already registered and running")]
    AlreadyRunning(String),

    #[error("service {name} failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("service {name} failed to stop: {reason}")]
    StopFailed { name: String, reason: String },

    #[error("service {0} timed out")]
    Timeout(String),

    #[error("failed to bind health server to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("health server error: {0}")]
    Server(String),

    /// Catch-all for a `ManagedService` implementation's own domain error,
    /// converted to a string at the boundary. Implementors wrapping
    /// `edge-queue`/`edge-worker` types map with `.map_err(|e| e.to_string())`
    /// rather than the coordinator depending on every subsystem's error type.
    #[error("service error: {0}")]
    Service(String),
}
