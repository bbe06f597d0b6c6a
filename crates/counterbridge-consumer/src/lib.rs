//! CounterBridge Consumer
//!
//! The consumer engine: durably reads counter events from an append-only
//! log, folds them into net deltas under bounded time/size windows, and
//! flushes the result to a pluggable provider with at-least-once semantics.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  read_new / read_pending  ┌──────────────┐
//! │ event log │ ─────────────────────────▶│  read loop   │
//! │ (group    │                           │ parse + fold │
//! │  cursor)  │ ◀──────── acknowledge ─── └──────┬───────┘
//! └───────────┘                                  │ Aggregator
//!                                                ▼
//!                       timer / size      ┌──────────────┐   flush    ┌──────────┐
//!                       triggers ────────▶│    flush     │ ──────────▶│ provider │
//!                                         │ coordinator  │ ◀───────── │ (upsert) │
//!                                         └──────────────┘ FlushReport└──────────┘
//! ```
//!
//! Failure handling is the interesting part:
//!
//! - **Partial flush failure**: the failed scopes re-enter the aggregator
//!   with their original deltas; the batch's ids are acknowledged anyway,
//!   because every delta is either durable or safely re-queued.
//! - **Total flush failure** (including a report that *every* scope
//!   failed): the whole batch re-enters the aggregator, the ids stay
//!   pending, and the log's redelivery machinery guarantees retry even
//!   across a crash.
//! - **Log read failure**: counted, backed off, retried forever.
//!
//! Malformed entries are dropped with a warning and never acknowledged;
//! startup recovery will re-deliver, re-warn, and re-drop them until the
//! log trims the entries (see the operator notes in `DESIGN.md`).
//!
//! ## Duplicates
//!
//! Delivery is at-least-once. A crash after a successful provider flush but
//! before acknowledgement re-applies the same batch on restart; providers
//! are additive and do not dedupe by entry id.

pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod stats;

mod flush;

pub use config::{
    ConsumerConfig, DEFAULT_GROUP, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_WAIT,
    DEFAULT_READ_RETRY_DELAY, DEFAULT_STREAM_KEY,
};
pub use consumer::{CounterConsumer, CounterConsumerBuilder};
pub use error::{ConsumerError, Result};
pub use events::{ConsumerEvent, Warning};
pub use stats::StatsSnapshot;

// The trait halves of the contract, re-exported for embedding convenience.
pub use counterbridge_log::EventLog;
pub use counterbridge_provider::CounterProvider;
