//! Error types for the board node.

use thiserror::Error;

/// Result type for board node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a board node.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad environment or configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] wishtree_protocols::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
