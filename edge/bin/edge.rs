#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use edge::{config::EdgeConfig, Edge};
use edge_common::log::Logger;

#[tokio::main]
async fn main() -> edge::Result<()> {
    let config_path = find_config_file()?;
    let config = EdgeConfig::load(&config_path)?;

    Logger::init();
    tracing::info!(path = %config_path.display(), "loaded configuration");

    Edge::new(config).run().await
}

/// Find the configuration file using the following precedence:
/// 1. `EDGE_CONFIG` environment variable
/// 2. `./edge.config.toml` (current working directory)
/// 3. `/etc/edge/edge.config.toml` (system-wide config)
fn find_config_file() -> edge::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("EDGE_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(not_found(format!(
            "EDGE_CONFIG points to non-existent file: {}",
            path.display()
        )));
    }

    let default_paths = [
        PathBuf::from("./edge.config.toml"),
        PathBuf::from("/etc/edge/edge.config.toml"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(not_found(format!(
        "no configuration file found. Tried:\n  - EDGE_CONFIG environment variable\n{paths_tried}"
    )))
}

fn not_found(message: String) -> edge::EdgeError {
    edge::config::ConfigLoadError::Read {
        path: PathBuf::new(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
    }
    .into()
}
