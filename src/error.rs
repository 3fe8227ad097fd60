//! Error types for the status daemon.

/// Top-level error type for the status sync system.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Calendar feed fetch error (network, HTTP status).
    #[error("feed error: {0}")]
    Feed(String),

    /// Calendar feed parse error.
    #[error("feed parse error: {0}")]
    Parse(String),

    /// Tagged region not found in a target's current text.
    #[error("text does not match tagged-region pattern {pattern:?}")]
    TagMissing { pattern: String },

    /// Door sensor read error.
    #[error("sensor error: {0}")]
    Sensor(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, StatusError>;
