#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod control_handler;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ingress;
pub mod service_adapters;

pub use config::EdgeConfig;
pub use controller::Edge;
pub use error::{EdgeError, Result};
pub use ingress::CommandIngress;
