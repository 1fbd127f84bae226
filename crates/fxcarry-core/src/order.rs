//! Order intent and outcome types.
//!
//! `OrderIntent` is the only value the gateway will accept for a mutating
//! call. Its constructors enforce the safety invariants at the type seam:
//! an OPEN intent cannot exist unless the system is armed and the account
//! is flat, and every intent carries a fresh idempotency key.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::account::{AccountSnapshot, PositionId};
use crate::decimal::Size;
use crate::decision::LockState;
use crate::error::CoreError;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side (used when settling a position).
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Idempotency key for a single mutating attempt.
///
/// CRITICAL: a mutating call for a given key is attempted at most once.
/// Fresh key per attempt; never reused, never regenerated on retry because
/// there are no retries on mutating calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Create a new unique key.
    ///
    /// Format: `fx_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("fx_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the intent opens a new position or settles an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Open,
    Close,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Close => write!(f, "CLOSE"),
        }
    }
}

/// A fully authorized mutating request, ready for exactly one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub key: IdempotencyKey,
    pub action: OrderAction,
    pub pair: String,
    pub side: OrderSide,
    pub size: Size,
    /// Target position for CLOSE intents; always `None` for OPEN.
    pub position_id: Option<PositionId>,
}

impl OrderIntent {
    /// Build an OPEN intent.
    ///
    /// Refuses to construct unless the two-stage lock is armed and the
    /// account snapshot shows no open positions. Callers upstream make the
    /// same checks; this constructor is the last line that cannot be
    /// bypassed.
    pub fn open(
        pair: impl Into<String>,
        side: OrderSide,
        size: Size,
        lock: &LockState,
        snapshot: &AccountSnapshot,
    ) -> Result<Self, CoreError> {
        if !lock.armed() {
            return Err(CoreError::OpenIntentRefused("not armed".to_string()));
        }
        if !snapshot.is_flat() {
            return Err(CoreError::OpenIntentRefused(format!(
                "position cap: {} open position(s)",
                snapshot.open_positions.len()
            )));
        }
        if !size.is_positive() {
            return Err(CoreError::InvalidSize(size.to_string()));
        }
        Ok(Self {
            key: IdempotencyKey::new(),
            action: OrderAction::Open,
            pair: pair.into(),
            side,
            size,
            position_id: None,
        })
    }

    /// Build a CLOSE intent that settles a specific position.
    pub fn close(
        pair: impl Into<String>,
        side: OrderSide,
        size: Size,
        position_id: PositionId,
    ) -> Result<Self, CoreError> {
        if !size.is_positive() {
            return Err(CoreError::InvalidSize(size.to_string()));
        }
        Ok(Self {
            key: IdempotencyKey::new(),
            action: OrderAction::Close,
            pair: pair.into(),
            side,
            size,
            position_id: Some(position_id),
        })
    }
}

/// Outcome of a single mutating call, classified three ways.
///
/// `Ambiguous` means the call may or may not have executed (timeout,
/// malformed response). It must never be collapsed into `Confirmed` or
/// `Rejected`, and never triggers an automatic retry; the coordinator
/// halts and a human reconciles against an authoritative read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum OrderOutcome {
    Confirmed { exchange_order_id: String },
    Rejected { reason: String },
    Ambiguous { detail: String },
}

impl OrderOutcome {
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }
}

impl fmt::Display for OrderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed { exchange_order_id } => write!(f, "CONFIRMED({exchange_order_id})"),
            Self::Rejected { reason } => write!(f, "REJECTED({reason})"),
            Self::Ambiguous { detail } => write!(f, "AMBIGUOUS({detail})"),
        }
    }
}
