//! Typed observability events.
//!
//! The consumer reports its lifecycle and failures over a
//! `tokio::sync::broadcast` channel of [`ConsumerEvent`] values rather than
//! a stringly-keyed bus. Subscribers that fall behind lose the oldest
//! events (broadcast semantics), which is acceptable for observability
//! signals; the stats counters never lose anything.

/// Capacity of the broadcast channel behind
/// [`crate::CounterConsumer::subscribe`].
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 128;

/// An event emitted by the consumer.
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    /// The consumer finished starting: recovery is complete and the read
    /// loop is live.
    Started,

    /// The consumer stopped: final flush done, provider and log closed.
    Stopped,

    /// Startup recovery finished draining the pending cursor. `recovered`
    /// counts redelivered entries, including ones dropped as malformed.
    Recovery { recovered: usize },

    /// A flush persisted successfully. `flush_number` is 1-based and
    /// monotonically increasing for the life of the consumer.
    Flush {
        scope_count: usize,
        flush_number: u64,
    },

    /// A recoverable anomaly; see [`Warning`].
    Warn(Warning),

    /// A counted error: failed log read, failed flush, failed acknowledge.
    /// The consumer keeps running; `message` is diagnostic only.
    Error { message: String },
}

/// Recoverable anomalies surfaced as `Warn` events.
#[derive(Debug, Clone)]
pub enum Warning {
    /// The provider persisted only part of a batch; the failed scopes have
    /// been re-queued for the next flush.
    PartialFlushFailure {
        failed_scopes: usize,
        total_scopes: usize,
    },

    /// An entry could not be parsed and was dropped without acknowledgement.
    MalformedEvent { entry_id: String, detail: String },
}

impl Warning {
    /// Stable operator-facing message for this warning.
    pub fn message(&self) -> &'static str {
        match self {
            Warning::PartialFlushFailure { .. } => "Partial flush failure",
            Warning::MalformedEvent { .. } => "Dropped malformed event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_messages_are_stable() {
        let partial = Warning::PartialFlushFailure {
            failed_scopes: 1,
            total_scopes: 2,
        };
        assert_eq!(partial.message(), "Partial flush failure");

        let malformed = Warning::MalformedEvent {
            entry_id: "1-0".to_string(),
            detail: "missing scope".to_string(),
        };
        assert_eq!(malformed.message(), "Dropped malformed event");
    }
}
