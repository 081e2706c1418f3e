//! Control protocol for administering a running edge robot command service
//!
//! This module provides an IPC mechanism using Unix domain sockets to:
//! - Inspect and manage the command queue
//! - Start/stop/inspect coordinator-managed services
//! - Flush and inspect the offline buffer
//! - Check system health
//!
//! The protocol uses bincode for efficient serialization.

pub mod auth;
pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use auth::ControlAuthConfig;
pub use client::ControlClient;
pub use error::{ControlError, Result};
pub use protocol::{
    CoordinatorCommand, OfflineCommand, PROTOCOL_VERSION, QueueCommand, Request, RequestCommand, Response,
    ResponsePayload, SystemCommand,
};
pub use server::ControlServer;

/// Default path for the control socket
pub const DEFAULT_CONTROL_SOCKET: &str = "/tmp/edge.sock";
