//! Sync operation data structures.
//!
//! A [`SyncOperation`] is one buffered write (create, update, or delete)
//! waiting for delivery to the remote record store. Operations are created
//! by callers (typically the [`crate::coordinator::OptimisticCoordinator`]),
//! mutated only during a drain pass, and removed once they reach a terminal
//! status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The write being buffered, tagged with its own payload shape.
///
/// Keeping the payload inside the variant means a malformed operation
/// (e.g. a delete without a record id) cannot be constructed in the
/// first place, so it can never reach the gateway layer.
///
/// # Example
///
/// ```
/// use offline_sync::OperationKind;
/// use serde_json::json;
///
/// let kind = OperationKind::Create { payload: json!({"name": "Saree"}) };
/// assert_eq!(kind.name(), "create");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationKind {
    /// Create a new record with the given payload.
    Create { payload: Value },
    /// Update an existing record with the given payload.
    Update { payload: Value },
    /// Delete the record with the given id.
    Delete { record_id: String },
}

impl OperationKind {
    /// Short name for logging and metrics labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Delivery status of a queued operation.
///
/// ```text
/// Pending → InFlight → {Completed | Pending (retry) | FailedPermanent}
/// ```
///
/// `InFlight` is never a resumable state: a snapshot loaded after a process
/// restart rewrites it to `Pending`, since an in-flight network call cannot
/// have survived the restart. `Completed` and `FailedPermanent` are terminal
/// and removed from the live queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting for the next drain pass.
    Pending,
    /// Dispatched to the gateway, outcome not yet known.
    InFlight,
    /// Delivered successfully (terminal).
    Completed,
    /// Retry budget exhausted or structurally undeliverable (terminal).
    FailedPermanent,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InFlight => write!(f, "InFlight"),
            Self::Completed => write!(f, "Completed"),
            Self::FailedPermanent => write!(f, "FailedPermanent"),
        }
    }
}

/// One buffered write operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Unique operation id (UUID v4).
    pub id: String,
    /// Logical target name, resolved to a concrete resource at drain time.
    pub target: String,
    /// The write itself.
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Enqueue timestamp (epoch millis). Drains pick in this order.
    pub enqueued_at: i64,
    /// Failed delivery attempts so far. Incremented only after a failed
    /// attempt, never decremented.
    pub retry_count: u32,
    /// Current delivery status.
    pub status: OperationStatus,
}

impl SyncOperation {
    /// Create a fresh pending operation with a generated id.
    pub fn new(target: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target: target.into(),
            kind,
            enqueued_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
            retry_count: 0,
            status: OperationStatus::Pending,
        }
    }
}

/// Point-in-time queue statistics, computed on demand from the live set.
/// Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// Operations waiting for the next drain.
    pub pending: usize,
    /// Operations currently dispatched to the gateway.
    pub in_flight: usize,
    /// Total operations enqueued since startup.
    pub total_enqueued: u64,
    /// Total operations delivered since startup.
    pub total_completed: u64,
    /// Total operations that failed permanently since startup.
    pub total_failed: u64,
    /// Last known connectivity state.
    pub online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_operation_is_pending() {
        let op = SyncOperation::new(
            "products",
            OperationKind::Create { payload: json!({"name": "Saree"}) },
        );

        assert_eq!(op.target, "products");
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.status, OperationStatus::Pending);
        assert!(op.enqueued_at > 0);
        assert!(!op.id.is_empty());
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let a = SyncOperation::new("products", OperationKind::Delete { record_id: "1".into() });
        let b = SyncOperation::new("products", OperationKind::Delete { record_id: "1".into() });
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(OperationKind::Create { payload: json!({}) }.name(), "create");
        assert_eq!(OperationKind::Update { payload: json!({}) }.name(), "update");
        assert_eq!(OperationKind::Delete { record_id: "x".into() }.name(), "delete");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let op = SyncOperation::new(
            "stock_movements",
            OperationKind::Update { payload: json!({"qty": 5, "sku": "A-1"}) },
        );

        let json_str = serde_json::to_string(&op).unwrap();
        let back: SyncOperation = serde_json::from_str(&json_str).unwrap();

        assert_eq!(back.id, op.id);
        assert_eq!(back.target, op.target);
        assert_eq!(back.kind, op.kind);
        assert_eq!(back.status, op.status);
    }

    #[test]
    fn test_kind_tag_is_flattened() {
        let op = SyncOperation::new(
            "products",
            OperationKind::Delete { record_id: "p-42".into() },
        );

        let json_str = serde_json::to_string(&op).unwrap();
        assert!(json_str.contains("\"op\":\"delete\""));
        assert!(json_str.contains("\"record_id\":\"p-42\""));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", OperationStatus::Pending), "Pending");
        assert_eq!(format!("{}", OperationStatus::InFlight), "InFlight");
        assert_eq!(format!("{}", OperationStatus::FailedPermanent), "FailedPermanent");
    }
}
