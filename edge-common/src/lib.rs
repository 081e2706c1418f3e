pub mod command;
pub mod error;
pub mod log;
pub mod message;

pub use message::{Message, Priority};
pub use tracing;

/// Broadcast payload used to unwind long-running tasks cooperatively.
///
/// Every subsystem that owns a loop (`QueueHandler::serve`, the coordinator's
/// health-check loop, the offline flush loop) subscribes to a
/// `tokio::sync::broadcast` channel carrying this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop accepting new work and begin a graceful drain.
    Shutdown,
    /// The drain has completed; safe to drop remaining receivers.
    Finalised,
}
