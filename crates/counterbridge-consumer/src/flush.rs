//! Flush coordination.
//!
//! A flush moves one drained batch from memory to the provider and settles
//! the log entries that contributed to it. Everything here revolves around
//! two rules:
//!
//! 1. **Serialize.** At most one provider flush is in flight per consumer
//!    instance. Concurrent triggers (timer, size threshold, shutdown) queue
//!    on the flush gate; once the in-flight flush completes, each waiter
//!    re-checks the aggregator and no-ops if it drained nothing new.
//! 2. **Settle by outcome.** Ids are acknowledged exactly when their data is
//!    safe: after full success, and after partial failure (the failed
//!    scopes' deltas are re-queued in memory, so nothing is lost). Only a
//!    total failure leaves ids unacknowledged, handing retry duty back to
//!    the log's redelivery machinery.
//!
//! The snapshot step (drain + take pending ids) happens under the fold-state
//! lock with no suspension point in between, so the read loop can keep
//! folding fresh events into the now-empty aggregator while the provider
//! call is in flight.

use counterbridge_core::{CounterEvent, EntryId, ScopeDeltas};

use crate::consumer::Shared;
use crate::events::{ConsumerEvent, Warning};

/// What a flush attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushOutcome {
    /// Nothing to flush; no provider call, no stats, no events.
    Idle,
    /// The batch is settled: persisted fully, or persisted with the failed
    /// subset re-queued in memory.
    Completed,
    /// Total failure: the whole batch was re-queued and its ids remain
    /// unacknowledged.
    Requeued,
}

/// Run one flush cycle. Safe to call from any trigger at any time.
pub(crate) async fn run_flush(shared: &Shared) -> FlushOutcome {
    let _gate = shared.flush_gate.lock().await;

    let (batch, ids) = {
        let mut state = shared.state.lock().await;
        if state.aggregator.is_empty() {
            return FlushOutcome::Idle;
        }
        let batch = state.aggregator.drain();
        let ids = std::mem::take(&mut state.pending_ids);
        (batch, ids)
    };
    let total_scopes = batch.len();

    match shared.provider.flush(&batch).await {
        Ok(report) if report.is_success() => {
            shared.ack(&ids).await;
            let flush_number = shared.record_flush(total_scopes).await;
            tracing::debug!(scopes = total_scopes, flush_number, "flush completed");
            shared.emit(ConsumerEvent::Flush {
                scope_count: total_scopes,
                flush_number,
            });
            FlushOutcome::Completed
        }
        // Strict subset failed: the persisted part is settled, the failed
        // part lives on in the aggregator. The ids are discharged either way.
        Ok(report) if report.failed.len() < total_scopes => {
            let failed_scopes = report.failed.len();
            requeue(shared, &report.failed).await;
            shared.ack(&ids).await;
            shared.record_flush(total_scopes).await;
            tracing::warn!(
                failed_scopes,
                total_scopes,
                "partial flush failure, failed scopes re-queued"
            );
            shared.emit(ConsumerEvent::Warn(Warning::PartialFlushFailure {
                failed_scopes,
                total_scopes,
            }));
            FlushOutcome::Completed
        }
        // Every scope failed. For retry purposes this is a total failure,
        // not a partial one: re-add everything and keep the ids pending.
        Ok(_) => {
            retry_whole_batch(
                shared,
                &batch,
                ids,
                "provider reported all scopes failed".to_string(),
            )
            .await
        }
        Err(err) => retry_whole_batch(shared, &batch, ids, err.to_string()).await,
    }
}

/// Fold deltas back into the aggregator as synthetic events with fresh
/// timestamps.
async fn requeue(shared: &Shared, deltas: &ScopeDeltas) {
    let mut state = shared.state.lock().await;
    for (scope, delta) in deltas {
        state
            .aggregator
            .fold(&CounterEvent::synthetic(scope.clone(), *delta));
    }
}

async fn retry_whole_batch(
    shared: &Shared,
    batch: &ScopeDeltas,
    ids: Vec<EntryId>,
    message: String,
) -> FlushOutcome {
    {
        let mut state = shared.state.lock().await;
        for (scope, delta) in batch {
            state
                .aggregator
                .fold(&CounterEvent::synthetic(scope.clone(), *delta));
        }
        // Prepend the snapshot's ids so the pending list keeps delivery
        // order: these entries are older than anything folded meanwhile.
        let newer = std::mem::take(&mut state.pending_ids);
        state.pending_ids = ids;
        state.pending_ids.extend(newer);
    }
    tracing::error!(scopes = batch.len(), error = %message, "flush failed, batch re-queued");
    shared.record_error(format!("flush failed: {}", message)).await;
    FlushOutcome::Requeued
}
