//! Persists commands to SQLite while disconnected and replays them, in
//! priority/age order, once a send sink is online again. Grounded on
//! `offline_buffer.py` / `offline_queue_service.py`.

mod buffer;
mod config;
mod entry;
mod error;
mod service;

pub use buffer::{BufferSink, BufferStatistics, FlushSummary, OfflineBuffer};
pub use config::{OfflineBufferConfig, OfflineServiceConfig};
pub use entry::{BufferEntry, BufferEntryStatus};
pub use error::{OfflineError, Result};
pub use service::OfflineBufferService;
