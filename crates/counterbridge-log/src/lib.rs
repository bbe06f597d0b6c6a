//! CounterBridge Event Log
//!
//! This crate abstracts the append-only log the consumer reads from. The log
//! is accessed exclusively through a consumer-group primitive:
//!
//! - **Group creation** is idempotent; creating a group that already exists
//!   succeeds silently.
//! - **Two cursors** per group: the *new* cursor (entries never delivered to
//!   the group) and the *pending* cursor (entries delivered to a specific
//!   consumer but never acknowledged). The pending cursor is what makes
//!   crash recovery possible: it survives consumer restarts.
//! - **Acknowledgement** removes entries from the pending set once their
//!   contribution is durable.
//!
//! ```text
//! producers ──append──▶ [ stream ] ──read_new──▶ consumer A ──ack──▶ gone
//!                           │                        │
//!                           │                 (crash before ack)
//!                           │                        │
//!                           └──────read_pending──────┘  on restart
//! ```
//!
//! [`InMemoryLog`] is a complete in-process implementation with real
//! blocking-read semantics, used by tests and by embeddings that do not need
//! durability. Network-backed implementations plug in behind the same
//! [`EventLog`] trait and are shared as `Arc<dyn EventLog>`.

pub mod error;
pub mod memory;

pub use error::{LogError, Result};
pub use memory::InMemoryLog;

use std::time::Duration;

use async_trait::async_trait;
use counterbridge_core::{EntryId, LogEntry};

/// Append-only log with consumer-group delivery.
///
/// All implementations must be `Send + Sync`; the consumer shares them as
/// `Arc<dyn EventLog>` between its read loop and flush path.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Ensure `group` exists on `stream`, positioned at the log origin,
    /// creating the stream itself if needed.
    ///
    /// Idempotent: a group that already exists is not an error.
    /// Implementations swallow their backend's "group exists" condition and
    /// surface everything else.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;

    /// Read entries previously delivered to `consumer` but never
    /// acknowledged, in delivery order, strictly after `after` (`None`
    /// starts from the oldest pending entry). Returns at most `count`
    /// entries; an empty result means the pending set is exhausted.
    ///
    /// Never blocks.
    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: Option<&EntryId>,
        count: usize,
    ) -> Result<Vec<LogEntry>>;

    /// Read entries never delivered to `group`, assigning them to
    /// `consumer`'s pending set. Blocks until at least one entry is
    /// available or `block` elapses; a timeout yields an empty batch, not
    /// an error.
    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>>;

    /// Remove `ids` from the group's pending set. Returns how many entries
    /// were actually acknowledged; unknown ids are ignored.
    async fn acknowledge(&self, stream: &str, group: &str, ids: &[EntryId]) -> Result<u64>;

    /// Release the underlying connection. Subsequent operations fail with
    /// [`LogError::Closed`].
    async fn close(&self) -> Result<()>;
}
