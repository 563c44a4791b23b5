//! Remote operation gateway: the seam between the queue and the network.
//!
//! The engine never talks to the record store directly. Callers hand in an
//! implementation of [`RemoteGateway`], which lets tests substitute an
//! in-process fake and lets hosts plug in whatever transport they use.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Delivery failure reported by the gateway (or synthesized by the queue).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network error, 5xx-equivalent, or anything else worth retrying.
    #[error("transient delivery failure: {0}")]
    Transient(String),
    /// The gateway call exceeded the configured per-operation timeout.
    /// Counts toward the retry budget like any other failure.
    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The logical target has no known resource mapping. Retrying cannot
    /// help a configuration error, so this fails the operation immediately.
    #[error("no route for target '{0}'")]
    Unroutable(String),
}

impl GatewayError {
    /// Whether this failure bypasses the retry budget.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unroutable(_))
    }
}

/// Performs the actual create/update/delete calls against the remote
/// record store. `resource` is the concrete identifier a logical target
/// resolved to (see [`TargetMap`]).
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn create(&self, resource: &str, payload: &Value) -> Result<(), GatewayError>;
    async fn update(&self, resource: &str, payload: &Value) -> Result<(), GatewayError>;
    async fn delete(&self, resource: &str, record_id: &str) -> Result<(), GatewayError>;
}

/// Maps logical target names (e.g. `"products"`) to the concrete resource
/// identifiers the gateway understands (e.g. a remote table id).
///
/// # Example
///
/// ```
/// use offline_sync::TargetMap;
///
/// let targets = TargetMap::new()
///     .with_route("products", "tbl_products_v2")
///     .with_route("stock_movements", "tbl_stock_movements");
///
/// assert_eq!(targets.resolve("products"), Some("tbl_products_v2"));
/// assert_eq!(targets.resolve("orders"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TargetMap {
    routes: HashMap<String, String>,
}

impl TargetMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style route registration.
    #[must_use]
    pub fn with_route(mut self, target: impl Into<String>, resource: impl Into<String>) -> Self {
        self.routes.insert(target.into(), resource.into());
        self
    }

    /// Register a route on an existing map.
    pub fn insert(&mut self, target: impl Into<String>, resource: impl Into<String>) {
        self.routes.insert(target.into(), resource.into());
    }

    /// Resolve a logical target to its concrete resource identifier.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<&str> {
        self.routes.get(target).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
