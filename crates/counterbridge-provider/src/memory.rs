//! In-memory reference provider.
//!
//! Implements the full provider surface, including both optional
//! operations, against a `HashMap`. This is the executable specification of
//! the contract's semantics (additive upsert, zero-for-unknown reads) and
//! the default backend for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use counterbridge_core::ScopeDeltas;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::{CounterProvider, FlushReport, ProviderCapabilities};

/// In-memory [`CounterProvider`].
#[derive(Debug, Default)]
pub struct MemoryProvider {
    counters: RwLock<HashMap<String, i64>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes currently stored.
    pub async fn scope_count(&self) -> usize {
        self.counters.read().await.len()
    }
}

#[async_trait]
impl CounterProvider for MemoryProvider {
    async fn flush(&self, batch: &ScopeDeltas) -> Result<FlushReport> {
        let mut counters = self.counters.write().await;
        for (scope, delta) in batch {
            let value = counters.entry(scope.clone()).or_insert(0);
            *value = value.wrapping_add(*delta);
        }
        Ok(FlushReport::success())
    }

    async fn get(&self, scope: &str) -> Result<i64> {
        Ok(self.counters.read().await.get(scope).copied().unwrap_or(0))
    }

    async fn get_batch(&self, scopes: &[String]) -> Result<ScopeDeltas> {
        let counters = self.counters.read().await;
        Ok(scopes
            .iter()
            .map(|scope| (scope.clone(), counters.get(scope).copied().unwrap_or(0)))
            .collect())
    }

    async fn delete(&self, scope: &str) -> Result<()> {
        self.counters.write().await.remove(scope);
        Ok(())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            batch_get: true,
            delete: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(pairs: &[(&str, i64)]) -> ScopeDeltas {
        pairs
            .iter()
            .map(|(scope, delta)| (scope.to_string(), *delta))
            .collect()
    }

    #[tokio::test]
    async fn test_flush_creates_and_accumulates() {
        let provider = MemoryProvider::new();

        provider.flush(&batch(&[("likes", 3)])).await.unwrap();
        provider.flush(&batch(&[("likes", -1)])).await.unwrap();

        assert_eq!(provider.get("likes").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_scope_is_zero() {
        let provider = MemoryProvider::new();
        assert_eq!(provider.get("never-written").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_batch_over_counts() {
        // At-least-once delivery makes this the documented failure mode.
        let provider = MemoryProvider::new();
        let deltas = batch(&[("views", 10)]);
        provider.flush(&deltas).await.unwrap();
        provider.flush(&deltas).await.unwrap();
        assert_eq!(provider.get("views").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_get_batch_includes_unknown_scopes_as_zero() {
        let provider = MemoryProvider::new();
        provider.flush(&batch(&[("a", 1)])).await.unwrap();

        let values = provider
            .get_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values.get("a"), Some(&1));
        assert_eq!(values.get("b"), Some(&0));
    }

    #[tokio::test]
    async fn test_delete_removes_scope() {
        let provider = MemoryProvider::new();
        provider.flush(&batch(&[("a", 5)])).await.unwrap();
        provider.delete("a").await.unwrap();
        assert_eq!(provider.get("a").await.unwrap(), 0);
        assert_eq!(provider.scope_count().await, 0);
    }

    #[tokio::test]
    async fn test_capabilities_cover_optional_surface() {
        let provider = MemoryProvider::new();
        let caps = provider.capabilities();
        assert!(caps.batch_get);
        assert!(caps.delete);
    }
}
