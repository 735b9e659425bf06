//! Error types for desk-core

use thiserror::Error;

/// Main error type for desk-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Help request not found: {0}")]
    HelpRequestNotFound(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for desk-core
pub type Result<T> = std::result::Result<T, Error>;
