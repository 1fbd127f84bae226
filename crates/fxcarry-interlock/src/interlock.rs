//! Decision authorization.
//!
//! Precedence is strict and non-negotiable:
//! `ForceClose > Hold(safety block) > Execute`.
//!
//! The kill switch is evaluated before the proposal is even looked at, the
//! lock state is re-derived on every call, and `Execute` is produced only
//! when armed, the position cap is satisfied, and no cooldown is active.

use tracing::{info, warn};

use fxcarry_core::{AccountSnapshot, Clock, Decision, LockState, Proposal, SystemClock};

use crate::arming::ArmingControl;
use crate::kill_switch::{KillSwitch, KillVerdict};

/// Hard limit on simultaneously open positions.
pub const MAX_OPEN_POSITIONS: usize = 1;

/// Evaluates arming, position cap, and kill switch; produces the
/// authoritative `Decision` for a cycle.
pub struct SafetyInterlock<C: Clock = SystemClock> {
    arming: ArmingControl,
    kill_switch: KillSwitch<C>,
}

impl<C: Clock> SafetyInterlock<C> {
    pub fn new(arming: ArmingControl, kill_switch: KillSwitch<C>) -> Self {
        Self {
            arming,
            kill_switch,
        }
    }

    /// Re-derive the two-stage lock state. Never cached.
    #[must_use]
    pub fn lock_state(&self) -> LockState {
        self.arming.current()
    }

    /// Kill-switch check, runnable before the (slow) oracle call so a
    /// deteriorating account never waits on AI latency.
    #[must_use]
    pub fn pre_check(&self, snapshot: &AccountSnapshot) -> KillVerdict {
        self.kill_switch.evaluate(snapshot)
    }

    /// Authorize (or veto) a validated proposal against the current
    /// account snapshot. Returns the decision together with the lock
    /// state it was derived under, for auditing.
    pub fn authorize(
        &self,
        proposal: &Proposal,
        snapshot: &AccountSnapshot,
    ) -> (Decision, LockState) {
        let lock = self.arming.current();

        // 1. Kill switch overrides everything, including the proposal.
        let cooldown = match self.kill_switch.evaluate(snapshot) {
            KillVerdict::Tripped { reason } => {
                warn!(%reason, "Kill switch tripped; forcing close");
                return (Decision::ForceClose { reason }, lock);
            }
            KillVerdict::CoolingDown { remaining_ms } => Some(remaining_ms),
            KillVerdict::Clear => None,
        };

        // 2. A non-directional proposal holds, whatever else is true.
        let Some(side) = proposal.side.order_side() else {
            return (
                Decision::Hold {
                    reason: format!("proposal holds: {}", proposal.rationale),
                },
                lock,
            );
        };

        // 3. Safety blocks before any execute.
        if let Some(remaining_ms) = cooldown {
            return (
                Decision::Hold {
                    reason: format!("kill-switch cooldown active ({remaining_ms}ms remaining)"),
                },
                lock,
            );
        }

        if !lock.armed() {
            return (
                Decision::Hold {
                    reason: "not armed".to_string(),
                },
                lock,
            );
        }

        if snapshot.open_positions.len() >= MAX_OPEN_POSITIONS {
            return (
                Decision::Hold {
                    reason: format!(
                        "position cap reached ({}/{})",
                        snapshot.open_positions.len(),
                        MAX_OPEN_POSITIONS
                    ),
                },
                lock,
            );
        }

        info!(%side, confidence = proposal.confidence, "Proposal authorized");
        (Decision::Execute { side }, lock)
    }

    /// Access to the kill switch for operator controls and notifications.
    #[must_use]
    pub fn kill_switch(&self) -> &KillSwitch<C> {
        &self.kill_switch
    }
}
