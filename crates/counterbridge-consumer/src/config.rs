//! Consumer configuration.
//!
//! Tuning knobs for one consumer instance. The two that matter most are the
//! flush bounds: `max_wait` caps how long a delta may sit in memory, and
//! `max_messages` caps how many events accumulate before a flush is forced.
//! The same `max_wait` doubles as the blocking-read timeout so the read loop
//! never sleeps past a flush window.

use std::time::Duration;

use uuid::Uuid;

/// Default log key events are appended under.
pub const DEFAULT_STREAM_KEY: &str = "counter-bridge:events";

/// Default consumer-group name.
pub const DEFAULT_GROUP: &str = "counter-bridge-group";

/// Default flush window.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(500);

/// Default flush size threshold (and per-read batch cap).
pub const DEFAULT_MAX_MESSAGES: usize = 1000;

/// Default pause after a failed log read.
pub const DEFAULT_READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Configuration for a [`crate::CounterConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Log key to consume from.
    pub stream_key: String,

    /// Consumer-group name. All replicas of a deployment share one group so
    /// the log delivers each entry to exactly one of them.
    pub group: String,

    /// This instance's name within the group. Must be unique per process;
    /// the default embeds a random UUID.
    pub consumer_id: String,

    /// Flush window: maximum time a folded delta waits in memory, and the
    /// blocking-read timeout.
    pub max_wait: Duration,

    /// Flush size threshold: a flush is triggered as soon as this many
    /// events have been folded. Also bounds entries per log read.
    pub max_messages: usize,

    /// Back-off after a failed log read before retrying.
    pub read_retry_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            group: DEFAULT_GROUP.to_string(),
            consumer_id: format!("consumer-{}", Uuid::new_v4()),
            max_wait: DEFAULT_MAX_WAIT,
            max_messages: DEFAULT_MAX_MESSAGES,
            read_retry_delay: DEFAULT_READ_RETRY_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsumerConfig::default();
        assert_eq!(config.stream_key, "counter-bridge:events");
        assert_eq!(config.group, "counter-bridge-group");
        assert_eq!(config.max_wait, Duration::from_millis(500));
        assert_eq!(config.max_messages, 1000);
        assert_eq!(config.read_retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_consumer_ids_are_unique_per_instance() {
        let a = ConsumerConfig::default();
        let b = ConsumerConfig::default();
        assert!(a.consumer_id.starts_with("consumer-"));
        assert_ne!(a.consumer_id, b.consumer_id);
    }
}
