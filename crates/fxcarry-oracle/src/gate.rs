//! Proposal validation gate.
//!
//! Sits between the untrusted oracle and the safety interlock. Validates
//! shape only — side in the allowed set (already typed), confidence in
//! range, leverage sane — and normalizes the leverage suggestion down to
//! the configured maximum. It applies no safety policy: an Execute here is
//! still nothing more than a suggestion for the interlock to veto.

use rust_decimal::Decimal;
use tracing::warn;

use fxcarry_core::{Proposal, SnapshotId};

use crate::error::OracleResult;

/// Shape validation and normalization for oracle proposals.
pub struct ProposalGate {
    /// Ceiling applied to the oracle's leverage suggestion.
    max_leverage: Decimal,
}

impl ProposalGate {
    pub fn new(max_leverage: Decimal) -> Self {
        Self { max_leverage }
    }

    /// Turn whatever the oracle produced into a usable proposal.
    ///
    /// A malformed or missing proposal degrades to HOLD rather than
    /// failing the cycle.
    pub fn sanitize(&self, raw: OracleResult<Proposal>, snapshot_id: SnapshotId) -> Proposal {
        let mut proposal = match raw {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Oracle failed; degrading to HOLD");
                return Proposal::hold(format!("invalid proposal: {e}"), snapshot_id);
            }
        };

        if !proposal.confidence.is_finite() || !(0.0..=1.0).contains(&proposal.confidence) {
            warn!(
                confidence = proposal.confidence,
                "Proposal confidence out of range; degrading to HOLD"
            );
            return Proposal::hold(
                format!("invalid proposal: confidence {} out of range", proposal.confidence),
                snapshot_id,
            );
        }

        if proposal.suggested_leverage <= Decimal::ZERO {
            warn!(
                leverage = %proposal.suggested_leverage,
                "Proposal leverage not positive; degrading to HOLD"
            );
            return Proposal::hold(
                format!(
                    "invalid proposal: leverage {} not positive",
                    proposal.suggested_leverage
                ),
                snapshot_id,
            );
        }

        if proposal.suggested_leverage > self.max_leverage {
            warn!(
                suggested = %proposal.suggested_leverage,
                max = %self.max_leverage,
                "Clamping oracle leverage suggestion"
            );
            proposal.suggested_leverage = self.max_leverage;
        }

        proposal
    }
}
