use thiserror::Error;

pub type Result<T> = std::result::Result<T, OfflineError>;

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("entry {0} not found")]
    NotFound(String),
}
