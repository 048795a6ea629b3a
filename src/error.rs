//! PIIGuard error types

use thiserror::Error;

/// PIIGuard error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connector error (backend unreachable or misconfigured)
    #[error("Connector error: {0}")]
    Connector(String),

    /// Detection error
    #[error("Detection error: {0}")]
    Detection(String),

    /// Scan error
    #[error("Scan error: {0}")]
    Scan(String),

    /// DSR execution error
    #[error("DSR error: {0}")]
    Dsr(String),

    /// Concurrency ceiling exceeded
    #[error("Quota exceeded: {0}")]
    Quota(String),

    /// Illegal status transition
    #[error("Invalid state transition: {0}")]
    StateTransition(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for PIIGuard operations
pub type Result<T> = std::result::Result<T, Error>;
