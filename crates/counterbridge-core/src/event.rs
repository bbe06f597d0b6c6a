//! Event and log entry types.
//!
//! ## Two Representations
//!
//! A counter mutation exists in two forms:
//! - **On the wire** ([`LogEntry`]): a flat list of key/value string pairs
//!   plus the opaque id the log assigned at append time.
//! - **In memory** ([`CounterEvent`]): the validated form produced by the
//!   parser and consumed by the aggregator.
//!
//! The split mirrors how the log actually delivers data: the log knows
//! nothing about counters, it just stores field lists.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Current wall clock as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A single counter mutation.
///
/// `scope` is an opaque identifier chosen by the producer; the consumer never
/// interprets it. `delta` is signed: positive increments, negative
/// decrements, zero is legal and counts toward batch size without changing
/// the net value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterEvent {
    /// Opaque counter identifier.
    pub scope: String,

    /// Signed mutation applied to the counter.
    pub delta: i64,

    /// Epoch milliseconds. Informational only, never used for ordering.
    pub timestamp: i64,

    /// Optional free-form routing bag for provider-side use.
    pub metadata: Option<HashMap<String, String>>,
}

impl CounterEvent {
    pub fn new(scope: impl Into<String>, delta: i64, timestamp: i64) -> Self {
        Self {
            scope: scope.into(),
            delta,
            timestamp,
            metadata: None,
        }
    }

    /// An event manufactured by the consumer itself, stamped with the current
    /// wall clock. Used when re-queueing failed flush scopes.
    pub fn synthetic(scope: impl Into<String>, delta: i64) -> Self {
        Self::new(scope, delta, now_ms())
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Opaque, monotonically sortable identifier assigned by the log.
///
/// The consumer treats ids as tokens: it records them while an entry's
/// contribution sits in the aggregator and hands them back to the log on
/// acknowledgement. Only the log understands their internal structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A raw entry as delivered by the log: an id plus flat key/value pairs.
///
/// Field lists are short (four pairs in practice), so they stay a `Vec` and
/// are scanned linearly instead of being collected into a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: EntryId,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn new(id: impl Into<EntryId>, fields: Vec<(String, String)>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// First value recorded for `key`, if any.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // CounterEvent
    // ---------------------------------------------------------------

    #[test]
    fn test_event_construction() {
        let event = CounterEvent::new("page:home:views", 5, 1_700_000_000_000);
        assert_eq!(event.scope, "page:home:views");
        assert_eq!(event.delta, 5);
        assert_eq!(event.timestamp, 1_700_000_000_000);
        assert!(event.metadata.is_none());
    }

    #[test]
    fn test_event_negative_delta() {
        let event = CounterEvent::new("likes", -3, 0);
        assert_eq!(event.delta, -3);
    }

    #[test]
    fn test_synthetic_event_has_current_timestamp() {
        let before = now_ms();
        let event = CounterEvent::synthetic("likes", 2);
        let after = now_ms();
        assert!(event.timestamp >= before && event.timestamp <= after);
        assert!(event.metadata.is_none());
    }

    #[test]
    fn test_with_metadata() {
        let mut bag = HashMap::new();
        bag.insert("region".to_string(), "eu".to_string());
        let event = CounterEvent::new("likes", 1, 0).with_metadata(bag);
        assert_eq!(
            event.metadata.unwrap().get("region").map(String::as_str),
            Some("eu")
        );
    }

    // ---------------------------------------------------------------
    // EntryId
    // ---------------------------------------------------------------

    #[test]
    fn test_entry_id_display_roundtrip() {
        let id = EntryId::from("1700000000000-3");
        assert_eq!(id.to_string(), "1700000000000-3");
        assert_eq!(id.as_str(), "1700000000000-3");
    }

    #[test]
    fn test_entry_id_equality() {
        assert_eq!(EntryId::from("1-0"), EntryId::new("1-0"));
        assert_ne!(EntryId::from("1-0"), EntryId::from("1-1"));
    }

    // ---------------------------------------------------------------
    // LogEntry
    // ---------------------------------------------------------------

    #[test]
    fn test_log_entry_field_lookup() {
        let entry = LogEntry::new(
            "1-0",
            vec![
                ("scope".to_string(), "likes".to_string()),
                ("delta".to_string(), "1".to_string()),
            ],
        );
        assert_eq!(entry.field("scope"), Some("likes"));
        assert_eq!(entry.field("delta"), Some("1"));
        assert_eq!(entry.field("timestamp"), None);
    }

    #[test]
    fn test_log_entry_field_returns_first_match() {
        let entry = LogEntry::new(
            "1-0",
            vec![
                ("scope".to_string(), "a".to_string()),
                ("scope".to_string(), "b".to_string()),
            ],
        );
        assert_eq!(entry.field("scope"), Some("a"));
    }
}
