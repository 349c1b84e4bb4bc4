use nichefinder_scanner::ClientError;
use thiserror::Error;

/// Fatal errors of the crawl and analysis pipeline.
///
/// Per-query fetch failures are not represented here; the scheduler records
/// them against the node and keeps going.
#[derive(Error, Debug)]
pub enum NicheError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Corrupt crawl state: {0}")]
    CorruptState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Suggestion client error: {0}")]
    Client(#[from] ClientError),
}

pub type Result<T> = std::result::Result<T, NicheError>;
