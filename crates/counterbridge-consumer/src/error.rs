//! Error types for the consumer engine.

use counterbridge_log::LogError;
use counterbridge_provider::ProviderError;
use thiserror::Error;

/// Errors surfaced by the consumer's public API.
///
/// Runtime failures (read errors, flush failures) never appear here: they
/// are counted, emitted as events, and retried. This type covers
/// configuration mistakes and the startup/shutdown paths, which are the
/// only places an error is allowed to propagate.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type alias for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_log_error() {
        let err: ConsumerError = LogError::Closed.into();
        assert!(format!("{}", err).contains("closed"));
    }

    #[test]
    fn test_from_provider_error() {
        let err: ConsumerError = ProviderError::Backend("down".to_string()).into();
        assert!(format!("{}", err).contains("down"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConsumerError::Config("log required".to_string());
        assert_eq!(format!("{}", err), "Configuration error: log required");
    }
}
