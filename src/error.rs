// Error types for the player core
use thiserror::Error;

/// Main error type for shufflebox
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization errors
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),
}

/// Convenience Result type using the shufflebox Error
pub type Result<T> = std::result::Result<T, Error>;
