//! Log entry validation.
//!
//! Converts the flat key/value pairs of a [`LogEntry`] into a
//! [`CounterEvent`], or reports why it cannot.
//!
//! ## Validation Rules
//!
//! | Field       | Required | On absence / bad value                        |
//! |-------------|----------|-----------------------------------------------|
//! | `scope`     | yes      | entry is malformed (non-empty string required) |
//! | `delta`     | yes      | entry is malformed (must parse as i64)         |
//! | `timestamp` | no       | defaults to the current wall clock             |
//! | `metadata`  | no       | decode failure logs a warning, event proceeds  |
//!
//! Unknown keys are ignored so producers can evolve the entry format without
//! breaking older consumers.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::event::{now_ms, CounterEvent, LogEntry};

/// Recognized entry field names.
pub const FIELD_SCOPE: &str = "scope";
pub const FIELD_DELTA: &str = "delta";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_METADATA: &str = "metadata";

/// Parse a full log entry.
pub fn parse_entry(entry: &LogEntry) -> Result<CounterEvent, ParseError> {
    parse_fields(&entry.fields)
}

/// Parse a flat field list into a validated event.
///
/// Field lists are at most a handful of pairs, so a linear scan beats
/// building a temporary map on the hot path.
pub fn parse_fields(fields: &[(String, String)]) -> Result<CounterEvent, ParseError> {
    let mut scope: Option<&str> = None;
    let mut delta: Option<&str> = None;
    let mut timestamp: Option<&str> = None;
    let mut metadata: Option<&str> = None;

    for (key, value) in fields {
        match key.as_str() {
            FIELD_SCOPE => scope = Some(value),
            FIELD_DELTA => delta = Some(value),
            FIELD_TIMESTAMP => timestamp = Some(value),
            FIELD_METADATA => metadata = Some(value),
            _ => {}
        }
    }

    let scope = match scope {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            return Err(ParseError::MissingScope {
                raw: render_fields(fields),
            })
        }
    };

    let delta = delta.ok_or_else(|| ParseError::MissingDelta {
        raw: render_fields(fields),
    })?;
    let delta: i64 = delta.parse().map_err(|_| ParseError::InvalidDelta {
        value: delta.to_string(),
        raw: render_fields(fields),
    })?;

    // Unparseable timestamps fall back to the wall clock rather than failing
    // the entry: the field is informational.
    let timestamp = timestamp
        .and_then(|t| t.parse::<i64>().ok())
        .unwrap_or_else(now_ms);

    let metadata = metadata.and_then(|blob| decode_metadata(&scope, blob));

    Ok(CounterEvent {
        scope,
        delta,
        timestamp,
        metadata,
    })
}

/// Decode the metadata blob (a JSON object of string pairs). A decode
/// failure drops the metadata, not the event.
fn decode_metadata(scope: &str, blob: &str) -> Option<HashMap<String, String>> {
    match serde_json::from_str::<HashMap<String, String>>(blob) {
        Ok(map) => Some(map),
        Err(err) => {
            tracing::warn!(
                scope = %scope,
                error = %err,
                "undecodable metadata blob, event proceeds without metadata"
            );
            None
        }
    }
}

fn render_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EntryId;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ---------------------------------------------------------------
    // Happy path
    // ---------------------------------------------------------------

    #[test]
    fn test_parse_minimal_entry() {
        let event = parse_fields(&pairs(&[("scope", "likes"), ("delta", "1")])).unwrap();
        assert_eq!(event.scope, "likes");
        assert_eq!(event.delta, 1);
        assert!(event.metadata.is_none());
    }

    #[test]
    fn test_parse_full_entry() {
        let event = parse_fields(&pairs(&[
            ("scope", "post:42:likes"),
            ("delta", "-7"),
            ("timestamp", "1700000000000"),
            ("metadata", r#"{"region":"eu"}"#),
        ]))
        .unwrap();
        assert_eq!(event.scope, "post:42:likes");
        assert_eq!(event.delta, -7);
        assert_eq!(event.timestamp, 1_700_000_000_000);
        assert_eq!(
            event.metadata.unwrap().get("region").map(String::as_str),
            Some("eu")
        );
    }

    #[test]
    fn test_parse_zero_delta() {
        let event = parse_fields(&pairs(&[("scope", "x"), ("delta", "0")])).unwrap();
        assert_eq!(event.delta, 0);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let event = parse_fields(&pairs(&[
            ("scope", "x"),
            ("delta", "1"),
            ("shard", "7"),
            ("trace", "abc"),
        ]))
        .unwrap();
        assert_eq!(event.scope, "x");
        assert_eq!(event.delta, 1);
    }

    #[test]
    fn test_parse_entry_wrapper() {
        let entry = LogEntry::new(
            EntryId::from("1-0"),
            pairs(&[("scope", "x"), ("delta", "3")]),
        );
        let event = parse_entry(&entry).unwrap();
        assert_eq!(event.delta, 3);
    }

    // ---------------------------------------------------------------
    // Timestamp fallback
    // ---------------------------------------------------------------

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let before = now_ms();
        let event = parse_fields(&pairs(&[("scope", "x"), ("delta", "1")])).unwrap();
        assert!(event.timestamp >= before);
    }

    #[test]
    fn test_unparseable_timestamp_defaults_to_now() {
        let before = now_ms();
        let event = parse_fields(&pairs(&[
            ("scope", "x"),
            ("delta", "1"),
            ("timestamp", "yesterday"),
        ]))
        .unwrap();
        assert!(event.timestamp >= before);
    }

    // ---------------------------------------------------------------
    // Malformed entries
    // ---------------------------------------------------------------

    #[test]
    fn test_missing_scope_rejected() {
        let err = parse_fields(&pairs(&[("delta", "1")])).unwrap_err();
        assert!(matches!(err, ParseError::MissingScope { .. }));
        assert!(err.raw_fields().contains("delta=1"));
    }

    #[test]
    fn test_empty_scope_rejected() {
        let err = parse_fields(&pairs(&[("scope", ""), ("delta", "1")])).unwrap_err();
        assert!(matches!(err, ParseError::MissingScope { .. }));
    }

    #[test]
    fn test_missing_delta_rejected() {
        let err = parse_fields(&pairs(&[("scope", "x")])).unwrap_err();
        assert!(matches!(err, ParseError::MissingDelta { .. }));
    }

    #[test]
    fn test_non_integer_delta_rejected() {
        let err = parse_fields(&pairs(&[("scope", "x"), ("delta", "1.5")])).unwrap_err();
        match err {
            ParseError::InvalidDelta { value, .. } => assert_eq!(value, "1.5"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_fields_rejected_with_raw_dump() {
        let err = parse_fields(&pairs(&[("bad", "data")])).unwrap_err();
        assert!(err.raw_fields().contains("bad=data"));
    }

    // ---------------------------------------------------------------
    // Metadata decode failure is non-fatal
    // ---------------------------------------------------------------

    #[test]
    fn test_bad_metadata_drops_blob_not_event() {
        let event = parse_fields(&pairs(&[
            ("scope", "x"),
            ("delta", "2"),
            ("metadata", "{not json"),
        ]))
        .unwrap();
        assert_eq!(event.delta, 2);
        assert!(event.metadata.is_none());
    }

    #[test]
    fn test_non_object_metadata_dropped() {
        let event = parse_fields(&pairs(&[
            ("scope", "x"),
            ("delta", "2"),
            ("metadata", "[1,2,3]"),
        ]))
        .unwrap();
        assert!(event.metadata.is_none());
    }
}
