//! Recovery and reconciliation.
//!
//! The persisted state file is only a hint. After a restart — and before
//! leaving `Halted` — the coordinator rebuilds its state from an
//! authoritative open-positions read: zero positions means `Idle`, one
//! means `ConfirmedOpen` with the exchange's own view of the position,
//! and more than one is a cap breach that stays `Halted` for an operator.

use std::sync::Arc;

use tracing::{info, warn};

use fxcarry_audit::AuditRecord;
use fxcarry_core::SnapshotId;
use fxcarry_gateway::ExchangeGateway;

use crate::coordinator::{CoordinatorState, ExecutionCoordinator};
use crate::error::ExecutorResult;

impl<G: ExchangeGateway> ExecutionCoordinator<G> {
    /// Restore state after a restart.
    ///
    /// Loads the persisted hint, then reconciles. A persisted
    /// `ConfirmedOpen` or in-flight state is never trusted on its own.
    pub async fn recover(&mut self) -> ExecutorResult<CoordinatorState> {
        if let Some(hint) = self.store_hint() {
            info!(state = %hint.state, "Loaded persisted coordinator state (hint only)");
            self.set_recovered(hint.state, hint.position);
        }
        self.reconcile("startup recovery").await
    }

    /// Reconcile against an authoritative read. This is the ONLY way out
    /// of `Halted`; it is invoked deliberately (startup, or an operator's
    /// `--reconcile`), never automatically after an ambiguous outcome.
    pub async fn reconcile(&mut self, trigger: &str) -> ExecutorResult<CoordinatorState> {
        info!(trigger, previous = %self.state(), "Reconciling against authoritative position read");

        let pair = self.pair().to_string();
        let gateway = Arc::clone(self.gateway());
        let mut positions = gateway.open_positions(&pair).await?;

        let next = if positions.is_empty() {
            self.set_recovered(CoordinatorState::Idle, None);
            CoordinatorState::Idle
        } else if positions.len() == 1 {
            let position = positions.remove(0);
            info!(position_id = %position.id, "Reconciled to an open position");
            self.set_recovered(CoordinatorState::ConfirmedOpen, Some(position));
            CoordinatorState::ConfirmedOpen
        } else {
            warn!(
                count = positions.len(),
                "Reconciliation found multiple open positions; staying halted"
            );
            self.set_recovered(CoordinatorState::Halted, None);
            CoordinatorState::Halted
        };

        self.audit_mut().append(AuditRecord::note(
            SnapshotId::new(),
            format!("reconciliation ({trigger}) -> {next}"),
        ))?;
        self.commit(next);

        info!(state = %next, "Reconciliation complete");
        Ok(next)
    }
}
