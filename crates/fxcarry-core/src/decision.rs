//! Authorization decision and lock-state types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::OrderSide;

/// Snapshot of the two-stage arm at the moment of a decision.
///
/// Derived fresh for every decision cycle; never cached. The system is
/// armed only when both flags are true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    /// The persisted configuration flag.
    pub config_flag_armed: bool,
    /// The runtime environment flag.
    pub env_flag_armed: bool,
}

impl LockState {
    /// True iff both stages of the lock agree.
    #[must_use]
    pub fn armed(&self) -> bool {
        self.config_flag_armed && self.env_flag_armed
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config={} env={} armed={}",
            self.config_flag_armed,
            self.env_flag_armed,
            self.armed()
        )
    }
}

/// The authoritative output of the safety interlock.
///
/// Precedence is strict: `ForceClose` overrides everything, a safety
/// `Hold` overrides `Execute`, and `Execute` is only produced when armed,
/// flat-or-capped checks pass, and the kill switch is clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Execute { side: OrderSide },
    Hold { reason: String },
    ForceClose { reason: String },
}

impl Decision {
    #[must_use]
    pub fn is_execute(&self) -> bool {
        matches!(self, Self::Execute { .. })
    }

    #[must_use]
    pub fn is_force_close(&self) -> bool {
        matches!(self, Self::ForceClose { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute { side } => write!(f, "EXECUTE({side})"),
            Self::Hold { reason } => write!(f, "HOLD({reason})"),
            Self::ForceClose { reason } => write!(f, "FORCE_CLOSE({reason})"),
        }
    }
}
