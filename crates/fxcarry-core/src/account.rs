//! Account state and position types.
//!
//! `Position` is owned exclusively by the execution coordinator: it is
//! created only on a confirmed open and destroyed only on a confirmed close.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Price, Size};
use crate::order::OrderSide;

/// Identifier tying a decision cycle back to the account snapshot it saw.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Create a fresh snapshot identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange-assigned position identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId(String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open position as tracked by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Exchange position identifier, required to settle it later.
    pub id: PositionId,
    /// Currency pair (e.g. "USD_JPY").
    pub pair: String,
    /// Direction of the position.
    pub side: OrderSide,
    /// Position size in base-currency units.
    pub size: Size,
    /// Average entry price.
    pub entry_price: Price,
    /// When the position was opened.
    pub opened_at: DateTime<Utc>,
    /// Swap income accrued so far (the reason this bot exists).
    pub swap_accrued: Price,
}

/// Snapshot of the account at the start of a decision cycle.
///
/// `margin_ratio` is the maintenance-margin ratio reported by the exchange;
/// the kill switch compares it against a configured floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub snapshot_id: SnapshotId,
    /// Account equity in quote currency.
    pub equity: Price,
    /// Maintenance-margin ratio.
    pub margin_ratio: Decimal,
    /// All open positions. The position cap allows at most one.
    pub open_positions: Vec<Position>,
    pub timestamp: DateTime<Utc>,
}

impl AccountSnapshot {
    /// Returns true if the account holds no open positions.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.open_positions.is_empty()
    }

    /// The single open position, if any.
    #[must_use]
    pub fn open_position(&self) -> Option<&Position> {
        self.open_positions.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_position() -> Position {
        Position {
            id: PositionId::new("p-1"),
            pair: "USD_JPY".to_string(),
            side: OrderSide::Buy,
            size: Size::new(dec!(10000)),
            entry_price: Price::new(dec!(150.00)),
            opened_at: Utc::now(),
            swap_accrued: Price::ZERO,
        }
    }

    #[test]
    fn test_snapshot_id_unique() {
        assert_ne!(SnapshotId::new(), SnapshotId::new());
    }

    #[test]
    fn test_is_flat() {
        let mut snapshot = AccountSnapshot {
            snapshot_id: SnapshotId::new(),
            equity: Price::new(dec!(1000000)),
            margin_ratio: dec!(5.0),
            open_positions: vec![],
            timestamp: Utc::now(),
        };
        assert!(snapshot.is_flat());

        snapshot.open_positions.push(sample_position());
        assert!(!snapshot.is_flat());
        assert_eq!(snapshot.open_position().unwrap().id, PositionId::new("p-1"));
    }
}
