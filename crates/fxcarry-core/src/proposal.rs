//! The strategy proposal produced by the AI oracle.
//!
//! A proposal is untrusted input. The proposal gate validates its shape and
//! the safety interlock decides whether it may execute; nothing in this
//! module grants authority to trade.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::account::SnapshotId;
use crate::error::CoreError;
use crate::order::OrderSide;

/// Directional recommendation from the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProposalSide {
    Buy,
    Sell,
    Hold,
}

impl ProposalSide {
    /// The executable order side, if the proposal is directional.
    #[must_use]
    pub fn order_side(&self) -> Option<OrderSide> {
        match self {
            Self::Buy => Some(OrderSide::Buy),
            Self::Sell => Some(OrderSide::Sell),
            Self::Hold => None,
        }
    }
}

impl fmt::Display for ProposalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for ProposalSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "HOLD" => Ok(Self::Hold),
            other => Err(CoreError::InvalidProposal(format!(
                "unknown side: {other}"
            ))),
        }
    }
}

/// A validated directional proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub side: ProposalSide,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Leverage suggestion used for sizing; clamped by the proposal gate.
    pub suggested_leverage: Decimal,
    pub rationale: String,
    pub generated_at: DateTime<Utc>,
    /// The account snapshot this proposal was generated against.
    pub snapshot_id: SnapshotId,
}

impl Proposal {
    /// A degraded HOLD proposal, used when the oracle fails or returns
    /// something malformed. Carries zero confidence and no leverage.
    pub fn hold(reason: impl Into<String>, snapshot_id: SnapshotId) -> Self {
        Self {
            side: ProposalSide::Hold,
            confidence: 0.0,
            suggested_leverage: Decimal::ONE,
            rationale: reason.into(),
            generated_at: Utc::now(),
            snapshot_id,
        }
    }
}
