// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background drain scheduler.
//!
//! One task multiplexes every drain trigger over `tokio::select!`:
//!
//! - a periodic interval tick
//! - connectivity transitions (offline → online fires immediately)
//! - visibility transitions (the surface coming back into view)
//! - enqueue wakeups from the queue itself
//!
//! After a pass in which every dispatched operation failed, the scheduler
//! backs off exponentially (bounded by `retry_backoff_max_ms`) before the
//! next pass; any progress resets the backoff. Shutdown persists the
//! queue one final time without touching the network.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::connectivity::ConnectivitySource;
use crate::queue::SyncQueue;

/// Owner of the background drain loop.
pub struct SyncScheduler {
    queue: Arc<SyncQueue>,
    connectivity: Arc<dyn ConnectivitySource>,
    visibility: watch::Receiver<bool>,
    drain_interval: Duration,
    batch_size: usize,
    backoff_initial: Duration,
    backoff_max: Duration,
    backoff_factor: f64,
    backoff_delay: Duration,
    backoff_until: Option<Instant>,
}

/// Handle to a spawned scheduler; dropping it does NOT stop the loop,
/// call [`SchedulerHandle::shutdown`] for an orderly stop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for the final queue persist.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "scheduler task panicked during shutdown");
        }
    }
}

impl SyncScheduler {
    #[must_use]
    pub fn new(
        queue: Arc<SyncQueue>,
        connectivity: Arc<dyn ConnectivitySource>,
        visibility: watch::Receiver<bool>,
        config: &SyncConfig,
    ) -> Self {
        let backoff_initial = Duration::from_millis(config.retry_backoff_ms);
        Self {
            queue,
            connectivity,
            visibility,
            drain_interval: config.drain_interval(),
            batch_size: config.drain_batch_size,
            backoff_initial,
            backoff_max: Duration::from_millis(config.retry_backoff_max_ms),
            backoff_factor: config.retry_backoff_factor,
            backoff_delay: backoff_initial,
            backoff_until: None,
        }
    }

    /// Spawn the drain loop on the current runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown, task }
    }

    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut online_rx = self.connectivity.subscribe();
        let mut visibility_rx = self.visibility.clone();
        let wake = self.queue.wake_handle();
        let mut ticker = tokio::time::interval(self.drain_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick so startup is signal-driven
        ticker.tick().await;

        self.queue.set_online(self.connectivity.is_online());
        info!(online = self.queue.is_online(), "sync scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.maybe_drain("interval").await;
                }
                Ok(()) = online_rx.changed() => {
                    let online = *online_rx.borrow_and_update();
                    self.queue.set_online(online);
                    if online {
                        info!("connectivity restored");
                        self.maybe_drain("reconnect").await;
                    } else {
                        info!("connectivity lost, buffering writes");
                    }
                }
                Ok(()) = visibility_rx.changed() => {
                    let visible = *visibility_rx.borrow_and_update();
                    if visible {
                        self.maybe_drain("visible").await;
                    }
                }
                _ = wake.notified() => {
                    self.maybe_drain("enqueue").await;
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        // Final snapshot so nothing enqueued after the last drain is lost
        self.queue.persist().await;
        info!("sync scheduler stopped");
    }

    /// Drain unless offline, empty, or still inside a backoff window.
    async fn maybe_drain(&mut self, trigger: &str) {
        if !self.queue.is_online() {
            debug!(trigger, "skipping drain while offline");
            return;
        }
        if self.queue.is_empty() {
            return;
        }
        if let Some(until) = self.backoff_until {
            if Instant::now() < until {
                debug!(trigger, "skipping drain during backoff");
                return;
            }
        }

        let report = self.queue.drain(self.batch_size).await;

        if report.attempted > 0 && report.completed == 0 && report.failed == 0 {
            // Whole batch failed transiently: back off before retrying
            self.backoff_until = Some(Instant::now() + self.backoff_delay);
            debug!(
                trigger,
                delay_ms = self.backoff_delay.as_millis() as u64,
                "drain made no progress, backing off"
            );
            self.backoff_delay =
                self.backoff_delay.mul_f64(self.backoff_factor).min(self.backoff_max);
        } else if report.attempted > 0 {
            self.backoff_delay = self.backoff_initial;
            self.backoff_until = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::HostSignal;
    use crate::gateway::{GatewayError, RemoteGateway, TargetMap};
    use crate::operation::OperationKind;
    use crate::persist::MemoryStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingGateway {
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl RemoteGateway for RecordingGateway {
        async fn create(&self, _: &str, _: &Value) -> Result<(), GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(GatewayError::Transient("offline".into()))
            } else {
                Ok(())
            }
        }
        async fn update(&self, _: &str, _: &Value) -> Result<(), GatewayError> {
            self.create("", &Value::Null).await
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), GatewayError> {
            self.create("", &Value::Null).await
        }
    }

    async fn make_queue(gateway: Arc<RecordingGateway>, config: &SyncConfig) -> Arc<SyncQueue> {
        Arc::new(
            SyncQueue::open(
                gateway,
                Arc::new(MemoryStore::new()),
                TargetMap::new().with_route("products", "tbl_products"),
                config,
            )
            .await,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_triggers_drain() {
        let gateway = Arc::new(RecordingGateway::default());
        let config = SyncConfig::default();
        let queue = make_queue(gateway.clone(), &config).await;
        let connectivity = Arc::new(HostSignal::new(false));
        let visibility = HostSignal::new(true);

        let handle = SyncScheduler::new(
            queue.clone(),
            connectivity.clone(),
            visibility.subscribe(),
            &config,
        )
        .spawn();
        tokio::task::yield_now().await;

        queue
            .enqueue("products", OperationKind::Create { payload: json!({"name": "Saree"}) })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Offline: the enqueue wakeup must not have dispatched anything
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 1);

        connectivity.set(true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_while_online_drains_promptly() {
        let gateway = Arc::new(RecordingGateway::default());
        let config = SyncConfig::default();
        let queue = make_queue(gateway.clone(), &config).await;
        let connectivity = Arc::new(HostSignal::new(true));
        let visibility = HostSignal::new(true);

        let handle = SyncScheduler::new(
            queue.clone(),
            connectivity,
            visibility.subscribe(),
            &config,
        )
        .spawn();
        tokio::task::yield_now().await;

        queue
            .enqueue("products", OperationKind::Update { payload: json!({"qty": 1}) })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(queue.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_backs_off_until_window_elapses() {
        let gateway = Arc::new(RecordingGateway::default());
        gateway.fail.store(true, Ordering::SeqCst);
        let config = SyncConfig {
            retry_backoff_ms: 1_000,
            retry_backoff_max_ms: 60_000,
            max_retries: 100,
            ..Default::default()
        };
        let queue = make_queue(gateway.clone(), &config).await;
        let connectivity = Arc::new(HostSignal::new(true));
        let visibility = HostSignal::new(true);

        let handle = SyncScheduler::new(
            queue.clone(),
            connectivity,
            visibility.subscribe(),
            &config,
        )
        .spawn();
        tokio::task::yield_now().await;

        queue
            .enqueue("products", OperationKind::Create { payload: json!({}) })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        // Visibility pokes inside the backoff window are ignored
        visibility.set(false);
        visibility.set(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        // After the window a poke dispatches again
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        visibility.set(false);
        visibility.set(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_persists_queue() {
        let gateway = Arc::new(RecordingGateway::default());
        let config = SyncConfig::default();
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(
            SyncQueue::open(
                gateway,
                store.clone(),
                TargetMap::new(),
                &config,
            )
            .await,
        );
        let connectivity = Arc::new(HostSignal::new(false));
        let visibility = HostSignal::new(true);

        let handle = SyncScheduler::new(
            queue.clone(),
            connectivity,
            visibility.subscribe(),
            &config,
        )
        .spawn();
        tokio::task::yield_now().await;

        queue
            .enqueue("products", OperationKind::Create { payload: json!({}) })
            .await;
        handle.shutdown().await;

        assert_eq!(store.snapshot_len(), Some(1));
    }
}
