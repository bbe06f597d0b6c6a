//! Parse error types.
//!
//! A malformed entry is dropped with a warning rather than failing the
//! consumer, so these errors carry the raw field list for diagnosis.

use thiserror::Error;

/// Why a log entry could not be converted into a [`crate::CounterEvent`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing or empty 'scope' field in entry [{raw}]")]
    MissingScope { raw: String },

    #[error("missing 'delta' field in entry [{raw}]")]
    MissingDelta { raw: String },

    #[error("'delta' is not a signed integer ('{value}') in entry [{raw}]")]
    InvalidDelta { value: String, raw: String },
}

impl ParseError {
    /// The raw `key=value` rendering of the offending entry.
    pub fn raw_fields(&self) -> &str {
        match self {
            ParseError::MissingScope { raw }
            | ParseError::MissingDelta { raw }
            | ParseError::InvalidDelta { raw, .. } => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_raw_fields() {
        let err = ParseError::MissingScope {
            raw: "delta=1 foo=bar".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("scope"));
        assert!(msg.contains("delta=1 foo=bar"));
    }

    #[test]
    fn test_invalid_delta_carries_value() {
        let err = ParseError::InvalidDelta {
            value: "ten".to_string(),
            raw: "scope=x delta=ten".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("'ten'"));
        assert_eq!(err.raw_fields(), "scope=x delta=ten");
    }
}
