//! Worker pool that dequeues robot commands and dispatches them to a
//! user-supplied [`pool::CommandHandler`].

pub mod error;
pub mod pool;

pub use error::{Result, WorkerError};
pub use pool::{CommandHandler, QueueHandler};
