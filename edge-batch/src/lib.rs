//! Structured multi-command execution: parallel, sequential, and
//! grouped-by-robot orchestration with per-command retry and result
//! aggregation.

mod error;
mod executor;
mod models;
mod result_store;

pub use error::{BatchError, Result};
pub use executor::BatchExecutor;
pub use models::{
    BatchCommand, BatchOptions, BatchResult, BatchSpec, BatchStatus, CommandResult, CommandStatus, ExecutionMode,
};
pub use result_store::{InMemoryResultStore, RecordStatus, ResultRecord, ResultStore};
