//! Error types for log access.

use thiserror::Error;

/// Errors surfaced by [`crate::EventLog`] implementations.
#[derive(Debug, Error)]
pub enum LogError {
    /// The stream does not exist and the operation cannot create it.
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// The consumer group was never created on this stream.
    #[error("Consumer group '{group}' not found on stream '{stream}'")]
    GroupNotFound { stream: String, group: String },

    /// The log connection has been closed.
    #[error("Log connection closed")]
    Closed,

    /// Transport-level failure talking to the log backend.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_group_not_found() {
        let err = LogError::GroupNotFound {
            stream: "counter-bridge:events".to_string(),
            group: "counter-bridge-group".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("counter-bridge-group"));
        assert!(msg.contains("counter-bridge:events"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: LogError = io.into();
        assert!(format!("{}", err).contains("reset"));
    }
}
