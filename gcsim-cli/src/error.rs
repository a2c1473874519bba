//! Error handling module for the gcsim CLI.

use thiserror::Error;

/// Main error type for the gcsim CLI application.
#[derive(Error, Debug)]
pub enum CliError {
    /// Error when logging or argument resolution fails.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error raised by the workload engine.
    #[error(transparent)]
    Sim(#[from] gcsim::SimError),

    /// Error when writing output fails.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when JSON serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using CliError.
pub type Result<T> = std::result::Result<T, CliError>;
