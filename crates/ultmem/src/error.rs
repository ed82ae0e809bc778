//! Error types for ultmem

use thiserror::Error;

/// Main error type for ultmem operations
#[derive(Error, Debug)]
pub enum UltError {
    /// Storage-related errors (tier files, archive directory)
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A URI that does not follow the `ult://<category>/<path>` shape
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// An operation required an item that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Two vectors of different length were compared
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Symlink resolution revisited a URI
    #[error("Symlink cycle detected at {0}")]
    SymlinkCycle(String),

    /// Import payload could not be processed
    #[error("Import error: {0}")]
    Import(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl From<serde_json::Error> for UltError {
    fn from(e: serde_json::Error) -> Self {
        UltError::Serialization(e.to_string())
    }
}

/// Result type alias for ultmem operations
pub type Result<T> = std::result::Result<T, UltError>;
