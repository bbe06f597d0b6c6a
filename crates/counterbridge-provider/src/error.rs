//! Error types for provider operations.

use thiserror::Error;

/// Errors surfaced by [`crate::CounterProvider`] implementations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not implement this optional operation.
    #[error("Operation not supported by this provider: {0}")]
    Unsupported(&'static str),

    /// The backing store rejected or failed the operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The provider has been closed.
    #[error("Provider closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        assert!(format!("{}", ProviderError::Unsupported("delete")).contains("delete"));
        assert!(format!("{}", ProviderError::Backend("timeout".to_string())).contains("timeout"));
        assert_eq!(format!("{}", ProviderError::Closed), "Provider closed");
    }

    #[test]
    fn test_question_mark_propagation() {
        fn inner() -> Result<()> {
            Err(ProviderError::Backend("boom".to_string()))?;
            Ok(())
        }
        assert!(inner().is_err());
    }
}
