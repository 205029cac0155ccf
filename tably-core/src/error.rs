//! Error types for tably-core

use thiserror::Error;

/// Main error type for the tably-core library
#[derive(Error, Debug)]
pub enum Error {
    /// History store error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Recognizer failure (transient; retry with a new image)
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Participant name was empty after trimming
    #[error("participant name is empty")]
    EmptyName,
}

/// Result type alias for tably-core
pub type Result<T> = std::result::Result<T, Error>;
