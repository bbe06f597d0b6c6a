//! CounterBridge Core
//!
//! This crate defines the data model shared by every CounterBridge component:
//! the counter events that producers append to the log, the raw log entries
//! the consumer reads back, the parser that converts one into the other, and
//! the in-memory aggregator that folds many events into net deltas.
//!
//! ## The Fold
//!
//! CounterBridge exists to absorb very high-rate counter mutations and persist
//! only their net effect. The key primitive is the fold:
//!
//! ```text
//! (likes, +1), (likes, +1), (likes, -1), (views, +10)
//!                     │
//!                     ▼ Aggregator::fold
//!             { likes: 1, views: 10 }
//! ```
//!
//! Folding is associative and commutative per scope, so the net value after a
//! drain equals the arithmetic sum of all deltas added since the last drain,
//! regardless of add order.
//!
//! ## Crate Contents
//!
//! - [`CounterEvent`]: a validated counter mutation.
//! - [`LogEntry`] / [`EntryId`]: the raw form delivered by the log.
//! - [`parse_entry`] / [`parse_fields`]: field-list validation.
//! - [`Aggregator`] / [`ScopeDeltas`]: the fold state and its drained form.
//!
//! Everything here is pure and synchronous; the async machinery lives in the
//! sibling crates.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod parse;

pub use aggregate::{Aggregator, ScopeDeltas};
pub use error::ParseError;
pub use event::{now_ms, CounterEvent, EntryId, LogEntry};
pub use parse::{parse_entry, parse_fields};
