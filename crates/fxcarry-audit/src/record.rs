//! Audit record payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fxcarry_core::{Decision, LockState, OrderIntent, OrderOutcome, SnapshotId};

/// One immutable entry in the audit log.
///
/// `seq` is assigned by `AuditLog::append` and is strictly increasing.
/// Optional fields are populated depending on what the record documents:
/// a decision, a dispatched intent, or a classified outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub snapshot_id: SnapshotId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_state: Option<LockState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_intent: Option<OrderIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_outcome: Option<OrderOutcome>,
    pub note: String,
}

impl AuditRecord {
    fn base(snapshot_id: SnapshotId, note: impl Into<String>) -> Self {
        Self {
            seq: 0,
            timestamp: Utc::now(),
            snapshot_id,
            decision: None,
            lock_state: None,
            order_intent: None,
            order_outcome: None,
            note: note.into(),
        }
    }

    /// Record an authorization decision together with the lock state it
    /// was derived under.
    pub fn decision(
        snapshot_id: SnapshotId,
        decision: Decision,
        lock_state: LockState,
        note: impl Into<String>,
    ) -> Self {
        Self {
            decision: Some(decision),
            lock_state: Some(lock_state),
            ..Self::base(snapshot_id, note)
        }
    }

    /// Record an order intent. Written durably BEFORE the gateway call.
    pub fn intent(
        snapshot_id: SnapshotId,
        intent: OrderIntent,
        lock_state: LockState,
        note: impl Into<String>,
    ) -> Self {
        Self {
            order_intent: Some(intent),
            lock_state: Some(lock_state),
            ..Self::base(snapshot_id, note)
        }
    }

    /// Record a classified outcome. Written durably BEFORE the coordinator
    /// commits the resulting state transition.
    pub fn outcome(
        snapshot_id: SnapshotId,
        intent: OrderIntent,
        outcome: OrderOutcome,
        note: impl Into<String>,
    ) -> Self {
        Self {
            order_intent: Some(intent),
            order_outcome: Some(outcome),
            ..Self::base(snapshot_id, note)
        }
    }

    /// Free-form note record (startup, reconciliation, operator actions).
    pub fn note(snapshot_id: SnapshotId, note: impl Into<String>) -> Self {
        Self::base(snapshot_id, note)
    }
}
