//! CounterBridge Provider Contract
//!
//! A provider is the durable side of the bridge: it receives drained
//! net-delta batches from the consumer and applies them to whatever store
//! backs the deployment. This crate defines the contract every provider must
//! satisfy, plus [`MemoryProvider`], the in-memory reference implementation.
//!
//! ## Failure Semantics
//!
//! The consumer's retry behavior hangs entirely on how `flush` reports
//! trouble, so the contract is explicit about the three outcomes:
//!
//! - **Success**: `Ok` with an empty [`FlushReport`]. Every scope is durable.
//! - **Partial failure**: `Ok` with `failed` naming the scopes that did not
//!   persist, carrying their original deltas *verbatim* — the consumer
//!   re-queues exactly those values, so a provider that mangles them loses
//!   data.
//! - **Total failure**: `Err`. Nothing is assumed durable.
//!
//! ## Duplicate Delivery
//!
//! Delivery is at-least-once: a crash between a successful flush and the
//! log acknowledgement re-applies the same batch after restart. Providers
//! are additive and do **not** dedupe by log id; deployments that need
//! exactly-once must layer an idempotency key behind this trait.
//!
//! ## Capabilities
//!
//! `get_batch` and `delete` are optional. Support is declared up front via
//! [`ProviderCapabilities`] so callers can pick a strategy at configuration
//! time instead of probing at runtime; the consumer falls back to parallel
//! singular reads when `batch_get` is absent.

pub mod error;
pub mod memory;

pub use error::{ProviderError, Result};
pub use memory::MemoryProvider;

use async_trait::async_trait;
use counterbridge_core::ScopeDeltas;
use serde::{Deserialize, Serialize};

/// Outcome of a [`CounterProvider::flush`] that completed without a
/// transport-level error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Scopes that could not be persisted, with their original net deltas.
    /// Empty means full success.
    pub failed: ScopeDeltas,
}

impl FlushReport {
    /// Report a fully successful flush.
    pub fn success() -> Self {
        Self::default()
    }

    /// Report a flush where `failed` scopes did not persist.
    pub fn with_failed(failed: ScopeDeltas) -> Self {
        Self { failed }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Optional-operation support, declared at configuration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// `get_batch` is implemented.
    pub batch_get: bool,
    /// `delete` is implemented.
    pub delete: bool,
}

/// Pluggable persistence for net counter deltas.
///
/// Implementations must be `Send + Sync`; the consumer shares them as
/// `Arc<dyn CounterProvider>`. A provider may be shared by several consumer
/// instances if its backend tolerates that; the consumer does not require it.
#[async_trait]
pub trait CounterProvider: Send + Sync {
    /// Called exactly once before any read or flush.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Persist a batch by *adding* each delta to the stored value for its
    /// scope, creating missing scopes (additive upsert). See the crate docs
    /// for the three-outcome failure semantics.
    async fn flush(&self, batch: &ScopeDeltas) -> Result<FlushReport>;

    /// Current persisted value for `scope`; zero if never written.
    async fn get(&self, scope: &str) -> Result<i64>;

    /// Batched read. Only invoked when [`capabilities`](Self::capabilities)
    /// reports `batch_get`.
    async fn get_batch(&self, scopes: &[String]) -> Result<ScopeDeltas> {
        let _ = scopes;
        Err(ProviderError::Unsupported("get_batch"))
    }

    /// Remove a scope entirely. Only invoked when
    /// [`capabilities`](Self::capabilities) reports `delete`.
    async fn delete(&self, scope: &str) -> Result<()> {
        let _ = scope;
        Err(ProviderError::Unsupported("delete"))
    }

    /// Called once during shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Which optional operations this provider supports.
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }
}
