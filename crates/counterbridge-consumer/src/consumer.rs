//! The consumer engine.
//!
//! One [`CounterConsumer`] owns a consumer-group cursor on the log, an
//! in-memory aggregator, and a provider handle, and keeps three invariants:
//!
//! 1. Every entry id it holds pending corresponds to deltas still in the
//!    aggregator or in an in-flight flush.
//! 2. No id is acknowledged before the flush containing its data has
//!    returned without total failure.
//! 3. At most one provider flush is in flight at a time.
//!
//! ## Startup
//!
//! ```text
//! initialize provider → ensure group → drain pending cursor (recovery)
//!       → recovery flush → running=true → Started → read loop + timer
//! ```
//!
//! Recovery replays the entries a previous incarnation read but never
//! acknowledged, folding them exactly like fresh ones, then flushes so the
//! in-flight set is settled before live consumption begins.
//!
//! ## Live operation
//!
//! The read loop issues blocking reads bounded by `(max_messages,
//! max_wait)` and folds each batch; when the aggregator reaches
//! `max_messages` events it flushes synchronously before the next read.
//! The timer fires every `max_wait` and flushes whatever accumulated.
//! Read errors back off for `read_retry_delay` and never kill the loop.
//!
//! ## Shutdown
//!
//! `stop` signals both tasks, joins them (waiting out any in-flight
//! flush), runs one final flush, then closes the provider and the log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use counterbridge_core::{parse_entry, Aggregator, EntryId, LogEntry, ScopeDeltas};
use counterbridge_log::EventLog;
use counterbridge_provider::CounterProvider;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::ConsumerConfig;
use crate::error::{ConsumerError, Result};
use crate::events::{ConsumerEvent, Warning, EVENT_CHANNEL_CAPACITY};
use crate::flush;
use crate::stats::{StatsInner, StatsSnapshot};

/// Fold state mutated by the read loop and snapshotted by flushes.
///
/// Both fields live behind one lock so a flush can drain the aggregator and
/// take the id list as a single atomic step.
#[derive(Default)]
pub(crate) struct FoldState {
    pub(crate) aggregator: Aggregator,
    pub(crate) pending_ids: Vec<EntryId>,
}

/// State shared between the consumer handle, the read loop, the flush
/// timer, and in-flight flushes.
pub(crate) struct Shared {
    pub(crate) config: ConsumerConfig,
    pub(crate) log: Arc<dyn EventLog>,
    pub(crate) provider: Arc<dyn CounterProvider>,
    pub(crate) state: Mutex<FoldState>,
    /// Single-slot lock serializing provider flushes.
    pub(crate) flush_gate: Mutex<()>,
    pub(crate) stats: Mutex<StatsInner>,
    pub(crate) running: AtomicBool,
    pub(crate) events: broadcast::Sender<ConsumerEvent>,
}

impl Shared {
    pub(crate) fn new(
        config: ConsumerConfig,
        log: Arc<dyn EventLog>,
        provider: Arc<dyn CounterProvider>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            log,
            provider,
            state: Mutex::new(FoldState::default()),
            flush_gate: Mutex::new(()),
            stats: Mutex::new(StatsInner::default()),
            running: AtomicBool::new(false),
            events,
        })
    }

    pub(crate) fn emit(&self, event: ConsumerEvent) {
        // A send error just means nobody is subscribed.
        let _ = self.events.send(event);
    }

    /// Parse a batch and fold the valid events, recording their ids as
    /// pending. Malformed entries are dropped with a warning and their ids
    /// are NOT recorded, so they are never acknowledged.
    pub(crate) async fn fold_entries(&self, entries: &[LogEntry]) {
        let mut folded = 0u64;
        {
            let mut state = self.state.lock().await;
            for entry in entries {
                match parse_entry(entry) {
                    Ok(event) => {
                        state.aggregator.fold(&event);
                        state.pending_ids.push(entry.id.clone());
                        folded += 1;
                    }
                    Err(err) => {
                        tracing::warn!(entry_id = %entry.id, error = %err, "dropped malformed event");
                        self.emit(ConsumerEvent::Warn(Warning::MalformedEvent {
                            entry_id: entry.id.to_string(),
                            detail: err.to_string(),
                        }));
                    }
                }
            }
        }
        if folded > 0 {
            self.stats.lock().await.events_processed += folded;
        }
    }

    /// Acknowledge flushed ids. A failure here is counted but not
    /// propagated: the data is already durable, and redelivery of the
    /// unacked entries merely re-applies it, which at-least-once permits.
    pub(crate) async fn ack(&self, ids: &[EntryId]) {
        if ids.is_empty() {
            return;
        }
        if let Err(err) = self
            .log
            .acknowledge(&self.config.stream_key, &self.config.group, ids)
            .await
        {
            tracing::error!(error = %err, count = ids.len(), "failed to acknowledge flushed entries");
            self.record_error(format!("acknowledge failed: {}", err))
                .await;
        }
    }

    pub(crate) async fn record_error(&self, message: String) {
        self.stats.lock().await.error_count += 1;
        self.emit(ConsumerEvent::Error { message });
    }

    /// Account a completed flush; returns its 1-based number.
    pub(crate) async fn record_flush(&self, batch_scopes: usize) -> u64 {
        let mut stats = self.stats.lock().await;
        stats.record_flush(batch_scopes, counterbridge_core::now_ms());
        stats.flush_count
    }
}

/// Lifecycle bookkeeping behind the consumer's start/stop lock.
#[derive(Default)]
struct Lifecycle {
    running: bool,
    initialized: bool,
    shutdown: Option<watch::Sender<bool>>,
    read_task: Option<JoinHandle<()>>,
    timer_task: Option<JoinHandle<()>>,
}

/// Bridges an event log to a counter provider.
///
/// ## Example
///
/// ```ignore
/// use counterbridge_consumer::CounterConsumer;
/// use counterbridge_log::InMemoryLog;
/// use counterbridge_provider::MemoryProvider;
/// use std::sync::Arc;
///
/// let consumer = CounterConsumer::builder()
///     .log(Arc::new(InMemoryLog::new()))
///     .provider(Arc::new(MemoryProvider::new()))
///     .group("analytics")
///     .build()?;
///
/// consumer.start().await?;
/// // ... producers append to the log; deltas land in the provider ...
/// println!("likes = {}", consumer.get("likes").await?);
/// consumer.stop().await?;
/// ```
pub struct CounterConsumer {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl CounterConsumer {
    pub fn builder() -> CounterConsumerBuilder {
        CounterConsumerBuilder::new()
    }

    /// Start consuming. Idempotent: a second call while running is a no-op,
    /// and the provider is initialized exactly once across calls.
    ///
    /// Runs the recovery phase synchronously; when this returns, every
    /// entry left in-flight by a previous incarnation has been re-folded
    /// and flushed.
    ///
    /// # Errors
    ///
    /// Propagates provider initialization and log errors. Group creation is
    /// idempotent, so only genuine backend failures surface here.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.running {
            return Ok(());
        }

        if !lifecycle.initialized {
            self.shared.provider.initialize().await?;
            lifecycle.initialized = true;
        }

        let config = &self.shared.config;
        self.shared
            .log
            .ensure_group(&config.stream_key, &config.group)
            .await?;

        let recovered = self.recover().await?;
        self.shared.emit(ConsumerEvent::Recovery { recovered });
        flush::run_flush(&self.shared).await;

        self.shared.running.store(true, Ordering::SeqCst);
        lifecycle.running = true;
        self.shared.emit(ConsumerEvent::Started);
        tracing::info!(
            stream = %config.stream_key,
            group = %config.group,
            consumer = %config.consumer_id,
            recovered,
            "consumer started"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.read_task = Some(tokio::spawn(read_loop(
            Arc::clone(&self.shared),
            shutdown_rx.clone(),
        )));
        lifecycle.timer_task = Some(tokio::spawn(flush_timer(
            Arc::clone(&self.shared),
            shutdown_rx,
        )));
        Ok(())
    }

    /// Stop consuming. Idempotent, and safe even if `start` failed partway.
    ///
    /// Waits out any in-flight flush, performs one final flush of whatever
    /// remains in the aggregator, then closes the provider and the log.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !lifecycle.running {
            return Ok(());
        }

        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(shutdown) = lifecycle.shutdown.take() {
            let _ = shutdown.send(true);
        }
        // Joining the loops waits out any in-flight flush; only then does
        // the final flush drain what is left.
        if let Some(task) = lifecycle.read_task.take() {
            let _ = task.await;
        }
        if let Some(task) = lifecycle.timer_task.take() {
            let _ = task.await;
        }
        flush::run_flush(&self.shared).await;

        let mut result = Ok(());
        if let Err(err) = self.shared.provider.close().await {
            tracing::error!(error = %err, "provider close failed");
            result = Err(ConsumerError::from(err));
        }
        if let Err(err) = self.shared.log.close().await {
            tracing::error!(error = %err, "log close failed");
            if result.is_ok() {
                result = Err(ConsumerError::from(err));
            }
        }

        lifecycle.running = false;
        self.shared.emit(ConsumerEvent::Stopped);
        tracing::info!(consumer = %self.shared.config.consumer_id, "consumer stopped");
        result
    }

    /// Drain this consumer's pending cursor, folding recovered entries
    /// exactly like fresh ones.
    async fn recover(&self) -> Result<usize> {
        let config = &self.shared.config;
        let mut recovered = 0usize;
        let mut cursor: Option<EntryId> = None;
        loop {
            let entries = self
                .shared
                .log
                .read_pending(
                    &config.stream_key,
                    &config.group,
                    &config.consumer_id,
                    cursor.as_ref(),
                    config.max_messages,
                )
                .await?;
            let Some(last) = entries.last() else { break };
            cursor = Some(last.id.clone());
            recovered += entries.len();
            self.shared.fold_entries(&entries).await;
        }
        if recovered > 0 {
            tracing::info!(recovered, "recovered in-flight entries from pending cursor");
        }
        Ok(recovered)
    }

    /// Current persisted value for `scope`, straight from the provider.
    pub async fn get(&self, scope: &str) -> Result<i64> {
        Ok(self.shared.provider.get(scope).await?)
    }

    /// Persisted values for several scopes. Uses the provider's batch read
    /// when it has one, otherwise falls back to parallel singular reads.
    pub async fn get_batch(&self, scopes: &[String]) -> Result<ScopeDeltas> {
        let provider = &self.shared.provider;
        if provider.capabilities().batch_get {
            return Ok(provider.get_batch(scopes).await?);
        }
        let reads = scopes.iter().map(|scope| {
            let provider = Arc::clone(provider);
            async move {
                provider
                    .get(scope)
                    .await
                    .map(|value| (scope.clone(), value))
            }
        });
        let values = futures::future::try_join_all(reads).await?;
        Ok(values.into_iter().collect())
    }

    /// Subscribe to the consumer's observability events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.shared.events.subscribe()
    }

    /// Point-in-time view of the consumer's counters.
    pub async fn stats(&self) -> StatsSnapshot {
        let pending = self.shared.state.lock().await.aggregator.len();
        self.shared.stats.lock().await.snapshot(pending)
    }
}

/// Live read loop: blocking group reads, folding, size-triggered flushes.
async fn read_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let config = shared.config.clone();
    while shared.running.load(Ordering::SeqCst) {
        let read = tokio::select! {
            read = shared.log.read_new(
                &config.stream_key,
                &config.group,
                &config.consumer_id,
                config.max_messages,
                config.max_wait,
            ) => read,
            _ = shutdown.changed() => break,
        };

        match read {
            Ok(entries) => {
                if !entries.is_empty() {
                    shared.fold_entries(&entries).await;
                }
                let size = shared.state.lock().await.aggregator.len();
                if size >= config.max_messages {
                    // Synchronous: the next read waits until the window's
                    // backlog is settled.
                    flush::run_flush(&shared).await;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "log read failed, backing off");
                shared
                    .record_error(format!("log read failed: {}", err))
                    .await;
                tokio::select! {
                    _ = sleep(config.read_retry_delay) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }
}

/// Recurring window flush. Re-arms only after the previous flush completes,
/// and never fires once the consumer is stopping.
async fn flush_timer(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = sleep(shared.config.max_wait) => {}
            _ = shutdown.changed() => break,
        }
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
        flush::run_flush(&shared).await;
    }
}

/// Builder for [`CounterConsumer`].
///
/// `log` and `provider` are required; everything else has the defaults
/// documented on [`ConsumerConfig`].
pub struct CounterConsumerBuilder {
    log: Option<Arc<dyn EventLog>>,
    provider: Option<Arc<dyn CounterProvider>>,
    config: ConsumerConfig,
}

impl CounterConsumerBuilder {
    pub fn new() -> Self {
        Self {
            log: None,
            provider: None,
            config: ConsumerConfig::default(),
        }
    }

    /// Set the event log to consume from.
    pub fn log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Set the persistence provider.
    pub fn provider(mut self, provider: Arc<dyn CounterProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Log key to consume from.
    pub fn stream_key(mut self, stream_key: impl Into<String>) -> Self {
        self.config.stream_key = stream_key.into();
        self
    }

    /// Consumer-group name shared by all replicas.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.config.group = group.into();
        self
    }

    /// This instance's unique name within the group.
    pub fn consumer_id(mut self, consumer_id: impl Into<String>) -> Self {
        self.config.consumer_id = consumer_id.into();
        self
    }

    /// Flush window and blocking-read timeout.
    pub fn max_wait(mut self, max_wait: std::time::Duration) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    /// Flush size threshold and per-read batch cap.
    pub fn max_messages(mut self, max_messages: usize) -> Self {
        self.config.max_messages = max_messages;
        self
    }

    /// Pause after a failed log read.
    pub fn read_retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.config.read_retry_delay = delay;
        self
    }

    /// Build the consumer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `log` or `provider` is missing,
    /// or when the flush bounds are degenerate.
    pub fn build(self) -> Result<CounterConsumer> {
        let log = self
            .log
            .ok_or_else(|| ConsumerError::Config("log required".into()))?;
        let provider = self
            .provider
            .ok_or_else(|| ConsumerError::Config("provider required".into()))?;
        if self.config.max_messages == 0 {
            return Err(ConsumerError::Config(
                "max_messages must be at least 1".into(),
            ));
        }
        if self.config.max_wait.is_zero() {
            return Err(ConsumerError::Config("max_wait must be non-zero".into()));
        }
        if self.config.consumer_id.is_empty() {
            return Err(ConsumerError::Config("consumer_id must be non-empty".into()));
        }

        Ok(CounterConsumer {
            shared: Shared::new(self.config, log, provider),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }
}

impl Default for CounterConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counterbridge_log::InMemoryLog;
    use counterbridge_provider::MemoryProvider;

    #[test]
    fn test_builder_requires_log() {
        let result = CounterConsumer::builder()
            .provider(Arc::new(MemoryProvider::new()))
            .build();
        assert!(matches!(result, Err(ConsumerError::Config(_))));
    }

    #[test]
    fn test_builder_requires_provider() {
        let result = CounterConsumer::builder()
            .log(Arc::new(InMemoryLog::new()))
            .build();
        assert!(matches!(result, Err(ConsumerError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_zero_bounds() {
        let result = CounterConsumer::builder()
            .log(Arc::new(InMemoryLog::new()))
            .provider(Arc::new(MemoryProvider::new()))
            .max_messages(0)
            .build();
        assert!(matches!(result, Err(ConsumerError::Config(_))));

        let result = CounterConsumer::builder()
            .log(Arc::new(InMemoryLog::new()))
            .provider(Arc::new(MemoryProvider::new()))
            .max_wait(std::time::Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConsumerError::Config(_))));
    }

    #[test]
    fn test_builder_applies_overrides() {
        let consumer = CounterConsumer::builder()
            .log(Arc::new(InMemoryLog::new()))
            .provider(Arc::new(MemoryProvider::new()))
            .stream_key("metrics:deltas")
            .group("metrics-consumers")
            .consumer_id("worker-1")
            .max_messages(50)
            .build()
            .unwrap();
        let config = &consumer.shared.config;
        assert_eq!(config.stream_key, "metrics:deltas");
        assert_eq!(config.group, "metrics-consumers");
        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.max_messages, 50);
    }
}
