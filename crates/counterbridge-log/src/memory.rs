//! In-process event log.
//!
//! A complete [`EventLog`] implementation backed by plain memory. It keeps
//! the real consumer-group semantics — per-group delivery cursor,
//! per-consumer pending sets, blocking reads, acknowledge-by-id — without a
//! network hop, which makes it the backend for tests and for embeddings that
//! do not need durability across process restarts.
//!
//! Entry ids are `millis-seq` strings, monotonically increasing per stream.
//! Blocking reads park on a [`Notify`] that `append` fires, so readers wake
//! on the next append instead of polling.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use counterbridge_core::{now_ms, EntryId, LogEntry};
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};

use crate::error::{LogError, Result};
use crate::EventLog;

/// In-memory [`EventLog`].
#[derive(Default)]
pub struct InMemoryLog {
    inner: Mutex<LogState>,
    appended: Notify,
    closed: AtomicBool,
}

#[derive(Default)]
struct LogState {
    streams: HashMap<String, StreamState>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<StoredEntry>,
    last_ms: i64,
    seq: u64,
    groups: HashMap<String, GroupState>,
}

struct StoredEntry {
    id: EntryId,
    fields: Vec<(String, String)>,
}

#[derive(Default)]
struct GroupState {
    /// Index of the next never-delivered entry.
    next_index: usize,
    /// Delivered-but-unacknowledged entry indexes, per consumer, in
    /// delivery order.
    pending: HashMap<String, Vec<usize>>,
}

impl StreamState {
    fn next_id(&mut self) -> EntryId {
        let ms = now_ms().max(self.last_ms);
        if ms == self.last_ms {
            self.seq += 1;
        } else {
            self.last_ms = ms;
            self.seq = 0;
        }
        EntryId::new(format!("{}-{}", ms, self.seq))
    }

    fn entry_at(&self, index: usize) -> LogEntry {
        let stored = &self.entries[index];
        LogEntry::new(stored.id.clone(), stored.fields.clone())
    }
}

/// Split a `millis-seq` id into its numeric parts for ordering.
fn parse_id(id: &EntryId) -> Option<(i64, u64)> {
    let (ms, seq) = id.as_str().split_once('-')?;
    Some((ms.parse().ok()?, seq.parse().ok()?))
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, creating the stream if needed. Returns the assigned
    /// id. This is the producer side of the contract; the consumer engine
    /// only ever reads.
    pub async fn append(&self, stream: &str, fields: Vec<(String, String)>) -> Result<EntryId> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }
        let id = {
            let mut state = self.inner.lock().await;
            let stream = state.streams.entry(stream.to_string()).or_default();
            let id = stream.next_id();
            stream.entries.push(StoredEntry {
                id: id.clone(),
                fields,
            });
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    /// Total entries ever appended to `stream`.
    pub async fn entry_count(&self, stream: &str) -> usize {
        let state = self.inner.lock().await;
        state.streams.get(stream).map_or(0, |s| s.entries.len())
    }

    /// Ids currently pending (delivered, unacknowledged) for `consumer`.
    pub async fn pending_ids(&self, stream: &str, group: &str, consumer: &str) -> Vec<EntryId> {
        let state = self.inner.lock().await;
        let Some(stream) = state.streams.get(stream) else {
            return Vec::new();
        };
        let Some(group) = stream.groups.get(group) else {
            return Vec::new();
        };
        group
            .pending
            .get(consumer)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&i| stream.entries[i].id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl EventLog for InMemoryLog {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.inner.lock().await;
        // Auto-create the stream; re-creating an existing group is a no-op.
        let stream_state = state.streams.entry(stream.to_string()).or_default();
        stream_state.groups.entry(group.to_string()).or_default();
        tracing::debug!(%stream, %group, "consumer group ensured");
        Ok(())
    }

    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: Option<&EntryId>,
        count: usize,
    ) -> Result<Vec<LogEntry>> {
        self.ensure_open()?;
        let state = self.inner.lock().await;
        let stream_state =
            state
                .streams
                .get(stream)
                .ok_or_else(|| LogError::GroupNotFound {
                    stream: stream.to_string(),
                    group: group.to_string(),
                })?;
        let group_state =
            stream_state
                .groups
                .get(group)
                .ok_or_else(|| LogError::GroupNotFound {
                    stream: stream.to_string(),
                    group: group.to_string(),
                })?;

        let Some(indexes) = group_state.pending.get(consumer) else {
            return Ok(Vec::new());
        };
        let floor = after.and_then(parse_id);
        let batch = indexes
            .iter()
            .map(|&i| &stream_state.entries[i])
            .filter(|entry| match floor {
                Some(floor) => parse_id(&entry.id).map_or(true, |id| id > floor),
                None => true,
            })
            .take(count)
            .map(|entry| LogEntry::new(entry.id.clone(), entry.fields.clone()))
            .collect();
        Ok(batch)
    }

    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>> {
        let deadline = Instant::now() + block;
        loop {
            self.ensure_open()?;

            // Register interest before inspecting state so an append between
            // the check and the await still wakes this reader.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock().await;
                let stream_state =
                    state
                        .streams
                        .get_mut(stream)
                        .ok_or_else(|| LogError::GroupNotFound {
                            stream: stream.to_string(),
                            group: group.to_string(),
                        })?;
                let total = stream_state.entries.len();
                let group_state = stream_state.groups.get_mut(group).ok_or_else(|| {
                    LogError::GroupNotFound {
                        stream: stream.to_string(),
                        group: group.to_string(),
                    }
                })?;

                if group_state.next_index < total {
                    let start = group_state.next_index;
                    let end = total.min(start + count.max(1));
                    group_state.next_index = end;
                    group_state
                        .pending
                        .entry(consumer.to_string())
                        .or_default()
                        .extend(start..end);
                    let batch = (start..end).map(|i| stream_state.entry_at(i)).collect();
                    return Ok(batch);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            if timeout(deadline - now, notified.as_mut()).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn acknowledge(&self, stream: &str, group: &str, ids: &[EntryId]) -> Result<u64> {
        self.ensure_open()?;
        if ids.is_empty() {
            return Ok(0);
        }
        let mut state = self.inner.lock().await;
        let stream_state =
            state
                .streams
                .get_mut(stream)
                .ok_or_else(|| LogError::GroupNotFound {
                    stream: stream.to_string(),
                    group: group.to_string(),
                })?;
        let acked: HashSet<&EntryId> = ids.iter().collect();
        let entries = &stream_state.entries;
        let group_state =
            stream_state
                .groups
                .get_mut(group)
                .ok_or_else(|| LogError::GroupNotFound {
                    stream: stream.to_string(),
                    group: group.to_string(),
                })?;

        let mut removed = 0u64;
        for indexes in group_state.pending.values_mut() {
            indexes.retain(|&i| {
                if acked.contains(&entries[i].id) {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        // Wake parked readers so they observe the closed flag.
        self.appended.notify_waiters();
        Ok(())
    }
}
