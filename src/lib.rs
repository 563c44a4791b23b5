// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # offline-sync
//!
//! Offline-resilient cache and write-queue engine for intermittently
//! connected clients (point-of-sale dashboards, field tooling).
//!
//! Two cooperating halves:
//!
//! - **Read path** ([`cache`]): a bounded TTL cache over JSON payloads
//!   with hybrid recency/frequency eviction and transparent compression
//!   of large values. Reads keep working from cache while the link is
//!   down.
//! - **Write path** ([`queue`] + [`scheduler`]): writes are applied to
//!   the cache optimistically and buffered as durable FIFO operations.
//!   A background scheduler drains the queue through a [`RemoteGateway`]
//!   whenever connectivity allows, with bounded-backoff retries, and the
//!   queue survives process restarts via a [`DurableStore`] snapshot.
//!
//! The engine never probes the network itself: the host feeds it
//! connectivity and visibility transitions through [`HostSignal`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use offline_sync::{
//!     CacheStore, HostSignal, JsonFileStore, OperationKind, SyncConfig,
//!     SyncQueue, SyncScheduler, TargetMap,
//! };
//! use offline_sync::connectivity::ConnectivitySource;
//! use serde_json::json;
//!
//! # use offline_sync::gateway::RemoteGateway;
//! # async fn demo(gateway: Arc<dyn RemoteGateway>) {
//! let config = SyncConfig::default();
//! let cache = Arc::new(CacheStore::new(&config));
//!
//! let store = Arc::new(JsonFileStore::new("/var/lib/pos/sync-queue.json"));
//! let targets = TargetMap::new().with_route("products", "tbl_products");
//! let queue = Arc::new(SyncQueue::open(gateway, store, targets, &config).await);
//!
//! let connectivity = Arc::new(HostSignal::new(true));
//! let visibility = HostSignal::new(true);
//! let handle = SyncScheduler::new(
//!     queue.clone(),
//!     connectivity.clone(),
//!     visibility.subscribe(),
//!     &config,
//! )
//! .spawn();
//!
//! cache.set("products:p1", json!({"price": 100}), None);
//! queue
//!     .enqueue("products", OperationKind::Create { payload: json!({"name": "Saree"}) })
//!     .await;
//!
//! handle.shutdown().await;
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod gateway;
pub mod metrics;
pub mod operation;
pub mod persist;
pub mod queue;
pub mod scheduler;

pub use cache::{CacheStats, CacheStore};
pub use config::SyncConfig;
pub use connectivity::{ConnectivitySource, HostSignal};
pub use coordinator::{OptimisticCoordinator, OptimisticWrite};
pub use gateway::{GatewayError, RemoteGateway, TargetMap};
pub use operation::{OperationKind, OperationStatus, SyncOperation, SyncStats};
pub use persist::{DurableStore, JsonFileStore, MemoryStore, PersistError, QueueSnapshot};
pub use queue::{DrainReport, SyncEvent, SyncQueue};
pub use scheduler::{SchedulerHandle, SyncScheduler};
