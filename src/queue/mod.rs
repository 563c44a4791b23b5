// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable FIFO queue of pending write operations.
//!
//! The [`SyncQueue`] owns the authoritative in-memory set of
//! [`SyncOperation`]s. Writes buffered while offline live here until a
//! drain pass delivers them through the [`RemoteGateway`]; the set is
//! mirrored to a [`DurableStore`] after every mutation batch so no write
//! is lost across a process restart.
//!
//! A drain dispatches up to `batch_size` eligible operations concurrently
//! (bounded fan-out, one fan-in before persisting), with a guard ensuring
//! only one drain runs at a time. Per-operation outcomes:
//!
//! - success → removed from the live set, `Completed` event
//! - transient failure or timeout → retry count bumped; at the cap the
//!   operation is dropped with a `FailedPermanent` event, otherwise it is
//!   re-appended as pending for the next pass
//! - unroutable target → immediate permanent failure, no retries
//!
//! Retried entries are re-appended to the end of eligibility, so ordering
//! across retried and fresh entries is best-effort rather than a total
//! order guarantee.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::gateway::{GatewayError, RemoteGateway, TargetMap};
use crate::operation::{OperationKind, OperationStatus, SyncOperation, SyncStats};
use crate::persist::{DurableStore, QueueSnapshot};

/// Queue lifecycle notifications, delivered via a broadcast channel.
/// Each terminal outcome is emitted exactly once.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A new operation entered the queue.
    Enqueued { id: String },
    /// The operation was delivered and removed.
    Completed { id: String },
    /// The operation exhausted its retry budget or was undeliverable.
    /// The caller is expected to surface this (offer retry or discard).
    FailedPermanent { id: String, reason: String },
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations dispatched this pass. Zero when the queue was empty or
    /// another drain was already in progress.
    pub attempted: usize,
    /// Delivered and removed.
    pub completed: usize,
    /// Failed transiently and re-queued as pending.
    pub retried: usize,
    /// Dropped as permanent failures.
    pub failed: usize,
}

/// Durable, ordered log of pending write operations.
pub struct SyncQueue {
    gateway: Arc<dyn RemoteGateway>,
    store: Arc<dyn DurableStore>,
    targets: TargetMap,
    live: parking_lot::Mutex<Vec<SyncOperation>>,
    draining: AtomicBool,
    online: AtomicBool,
    wake: Arc<Notify>,
    events: broadcast::Sender<SyncEvent>,
    max_retries: u32,
    op_timeout: Duration,
    total_enqueued: AtomicU64,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
}

impl SyncQueue {
    /// Open the queue, restoring any persisted snapshot.
    ///
    /// A snapshot that fails to load is discarded with a warning and the
    /// queue starts empty; operations found in-flight are rewritten to
    /// pending (an in-flight state cannot survive a restart).
    pub async fn open(
        gateway: Arc<dyn RemoteGateway>,
        store: Arc<dyn DurableStore>,
        targets: TargetMap,
        config: &SyncConfig,
    ) -> Self {
        let restored = match store.load().await {
            Ok(Some(snapshot)) => {
                let snapshot = snapshot.restore_pending();
                info!(operations = snapshot.operations.len(), "restored queue snapshot");
                snapshot.operations
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "queue snapshot unreadable, starting empty");
                Vec::new()
            }
        };

        let (events, _) = broadcast::channel(64);
        crate::metrics::set_queue_depth(restored.len());

        Self {
            gateway,
            store,
            targets,
            live: parking_lot::Mutex::new(restored),
            draining: AtomicBool::new(false),
            online: AtomicBool::new(false),
            wake: Arc::new(Notify::new()),
            events,
            max_retries: config.max_retries,
            op_timeout: config.op_timeout(),
            total_enqueued: AtomicU64::new(0),
            total_completed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }

    /// Buffer a write for delivery and return its operation id.
    ///
    /// The updated queue is persisted before returning (best-effort; a
    /// persistence failure is logged, the operation stays live in memory).
    /// Also nudges the scheduler so a drain is attempted promptly when
    /// connectivity is available.
    pub async fn enqueue(&self, target: impl Into<String>, kind: OperationKind) -> String {
        let op = SyncOperation::new(target, kind);
        let id = op.id.clone();

        debug!(id = %id, target = %op.target, kind = op.kind.name(), "operation enqueued");
        {
            let mut live = self.live.lock();
            live.push(op);
            crate::metrics::set_queue_depth(live.len());
        }
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_enqueue();

        self.persist().await;
        let _ = self.events.send(SyncEvent::Enqueued { id: id.clone() });
        self.wake.notify_one();
        id
    }

    /// Run one drain pass over up to `batch_size` pending operations.
    ///
    /// No-op (all-zero report) if another drain is already in progress.
    /// The queue state is persisted exactly once after the whole batch
    /// settles, not per entry.
    pub async fn drain(&self, batch_size: usize) -> DrainReport {
        if self.draining.swap(true, Ordering::AcqRel) {
            debug!("drain already in progress, skipping");
            return DrainReport::default();
        }
        let _guard = DrainGuard(&self.draining);

        let batch: Vec<SyncOperation> = {
            let mut live = self.live.lock();
            live.iter_mut()
                .filter(|op| op.status == OperationStatus::Pending)
                .take(batch_size)
                .map(|op| {
                    op.status = OperationStatus::InFlight;
                    op.clone()
                })
                .collect()
        };

        if batch.is_empty() {
            return DrainReport::default();
        }

        let mut report = DrainReport { attempted: batch.len(), ..Default::default() };
        debug!(batch = batch.len(), "drain pass dispatching");

        let mut join: JoinSet<(SyncOperation, Result<(), GatewayError>)> = JoinSet::new();
        for op in batch {
            let gateway = Arc::clone(&self.gateway);
            let timeout = self.op_timeout;
            let resolved = self.targets.resolve(&op.target).map(str::to_string);

            join.spawn(async move {
                let outcome = match resolved {
                    None => Err(GatewayError::Unroutable(op.target.clone())),
                    Some(resource) => {
                        let call = async {
                            match &op.kind {
                                OperationKind::Create { payload } => {
                                    gateway.create(&resource, payload).await
                                }
                                OperationKind::Update { payload } => {
                                    gateway.update(&resource, payload).await
                                }
                                OperationKind::Delete { record_id } => {
                                    gateway.delete(&resource, record_id).await
                                }
                            }
                        };
                        match tokio::time::timeout(timeout, call).await {
                            Ok(result) => result,
                            Err(_) => Err(GatewayError::Timeout(timeout)),
                        }
                    }
                };
                (op, outcome)
            });
        }

        while let Some(joined) = join.join_next().await {
            let (op, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "drain dispatch task failed");
                    continue;
                }
            };
            self.settle(op, outcome, &mut report);
        }

        self.persist().await;
        crate::metrics::record_drain(report.completed, report.retried, report.failed);
        info!(
            attempted = report.attempted,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            "drain pass complete"
        );
        report
    }

    /// Apply one delivery outcome to the live set.
    fn settle(
        &self,
        op: SyncOperation,
        outcome: Result<(), GatewayError>,
        report: &mut DrainReport,
    ) {
        let mut live = self.live.lock();
        let pos = match live.iter().position(|o| o.id == op.id) {
            Some(pos) => pos,
            // Removed out from under us (e.g. clear between dispatch and settle)
            None => return,
        };

        match outcome {
            Ok(()) => {
                live.remove(pos);
                self.total_completed.fetch_add(1, Ordering::Relaxed);
                report.completed += 1;
                debug!(id = %op.id, target = %op.target, "operation delivered");
                let _ = self.events.send(SyncEvent::Completed { id: op.id });
            }
            Err(err) if err.is_permanent() => {
                live.remove(pos);
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                report.failed += 1;
                warn!(id = %op.id, target = %op.target, error = %err, "operation undeliverable");
                let _ = self.events.send(SyncEvent::FailedPermanent {
                    id: op.id,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                let mut entry = live.remove(pos);
                entry.retry_count += 1;
                crate::metrics::record_retry();
                if entry.retry_count >= self.max_retries {
                    self.total_failed.fetch_add(1, Ordering::Relaxed);
                    report.failed += 1;
                    warn!(
                        id = %entry.id,
                        target = %entry.target,
                        retries = entry.retry_count,
                        error = %err,
                        "retry budget exhausted, dropping operation"
                    );
                    let _ = self.events.send(SyncEvent::FailedPermanent {
                        id: entry.id,
                        reason: err.to_string(),
                    });
                } else {
                    debug!(
                        id = %entry.id,
                        retry = entry.retry_count,
                        max = self.max_retries,
                        error = %err,
                        "delivery failed, re-queued"
                    );
                    entry.status = OperationStatus::Pending;
                    live.push(entry);
                    report.retried += 1;
                }
            }
        }
        crate::metrics::set_queue_depth(live.len());
    }

    /// Mirror the live set to durable storage. Logged, never raised.
    pub async fn persist(&self) {
        let snapshot = QueueSnapshot::new(self.live.lock().clone());
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "failed to persist queue snapshot");
        }
    }

    /// Subscribe to queue lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the live operations, in eligibility order.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<SyncOperation> {
        self.live.lock().clone()
    }

    /// Derived statistics; computed from the live set, never stored.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        let live = self.live.lock();
        let in_flight = live
            .iter()
            .filter(|op| op.status == OperationStatus::InFlight)
            .count();
        SyncStats {
            pending: live.len() - in_flight,
            in_flight,
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            total_completed: self.total_completed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            online: self.is_online(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Record the last known connectivity state (set by the scheduler).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Notify handle the scheduler waits on for fresh enqueues.
    #[must_use]
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }
}

/// RAII guard resetting the drain-in-progress flag.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
