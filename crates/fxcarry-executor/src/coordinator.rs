//! The execution state machine.
//!
//! States: `Idle`, `Submitting`, `ConfirmedOpen`, `SubmittingClose`,
//! `ConfirmedClosed`, `Halted`.
//!
//! Two rules shape everything here:
//! - The intent audit record is durable before dispatch, and the outcome
//!   record is durable before the transition commits, so "attempted vs
//!   confirmed" survives a crash mid-call.
//! - A mutating call is dispatched at most once. An ambiguous outcome
//!   (timeout, malformed response) transitions to `Halted` and stays
//!   there until an operator reconciles; it is never resolved silently.
//!
//! The caller runs one cycle at a time (the application holds the
//! coordinator behind an async mutex), so a kill signal can never abort
//! an in-flight submission: `apply` always drives an attempt to
//! Confirmed, Rejected, or Halted before returning.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use fxcarry_audit::{AuditLog, AuditRecord};
use fxcarry_core::{
    AccountSnapshot, Decision, LockState, MarketQuote, OrderIntent, OrderOutcome, OrderSide,
    Position, PositionId, Price,
};
use fxcarry_gateway::ExchangeGateway;

use crate::error::ExecutorResult;
use crate::sizing;
use crate::state_store::{PersistedState, StateStore};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Submitting,
    ConfirmedOpen,
    SubmittingClose,
    ConfirmedClosed,
    Halted,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Submitting => "SUBMITTING",
            Self::ConfirmedOpen => "CONFIRMED_OPEN",
            Self::SubmittingClose => "SUBMITTING_CLOSE",
            Self::ConfirmedClosed => "CONFIRMED_CLOSED",
            Self::Halted => "HALTED",
        };
        write!(f, "{s}")
    }
}

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Currency pair this coordinator trades.
    pub pair: String,
    /// Broker minimum lot unit for sizing.
    pub min_lot_unit: Decimal,
}

/// Per-cycle inputs for `apply`.
pub struct CycleContext<'a> {
    pub snapshot: &'a AccountSnapshot,
    pub quote: &'a MarketQuote,
    /// Lock state the decision was authorized under.
    pub lock: LockState,
    /// Leverage suggestion, already clamped by the proposal gate.
    pub leverage: Decimal,
}

/// What a cycle did, for notification and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No mutating action this cycle.
    Held { reason: String },
    /// Position opened and confirmed.
    Opened {
        position_id: PositionId,
        exchange_order_id: String,
        side: OrderSide,
    },
    /// Position settled and confirmed.
    Closed { position_id: PositionId },
    /// Exchange explicitly rejected the open; back to idle.
    OpenRejected { reason: String },
    /// Exchange explicitly rejected the close; position stands.
    CloseRejected { reason: String },
    /// Non-definite outcome; machine halted for manual reconciliation.
    Halted { reason: String },
    /// The gateway refused before dispatch (lock or duplicate-key guard).
    SafetyBlocked { reason: String },
    /// Force close requested but the account is already flat.
    NothingToClose,
}

/// The execution coordinator. Owns the `Position` exclusively.
pub struct ExecutionCoordinator<G: ExchangeGateway> {
    config: ExecutorConfig,
    gateway: Arc<G>,
    audit: AuditLog,
    store: StateStore,
    state: CoordinatorState,
    position: Option<Position>,
}

impl<G: ExchangeGateway> ExecutionCoordinator<G> {
    pub fn new(config: ExecutorConfig, gateway: Arc<G>, audit: AuditLog, store: StateStore) -> Self {
        Self {
            config,
            gateway,
            audit,
            store,
            state: CoordinatorState::Idle,
            position: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Apply an authorized decision.
    ///
    /// Every decision is audited, even holds: the log is the full record
    /// of what the system chose and why.
    pub async fn apply(
        &mut self,
        decision: Decision,
        ctx: CycleContext<'_>,
    ) -> ExecutorResult<CycleOutcome> {
        let snapshot_id = ctx.snapshot.snapshot_id.clone();
        self.audit.append(AuditRecord::decision(
            snapshot_id.clone(),
            decision.clone(),
            ctx.lock,
            format!("decision in state {}", self.state),
        ))?;

        if self.state == CoordinatorState::Halted {
            warn!(%decision, "Coordinator halted; decision ignored until reconciliation");
            return Ok(CycleOutcome::Halted {
                reason: "halted; awaiting manual reconciliation".to_string(),
            });
        }

        match decision {
            Decision::Hold { reason } => Ok(CycleOutcome::Held { reason }),
            Decision::Execute { side } => self.open_position(side, &ctx).await,
            Decision::ForceClose { reason } => self.close_position(&reason, &ctx).await,
        }
    }

    // ------------------------------------------------------------------
    // Open flow: IDLE -> SUBMITTING -> {CONFIRMED_OPEN, IDLE, HALTED}
    // ------------------------------------------------------------------

    async fn open_position(
        &mut self,
        side: OrderSide,
        ctx: &CycleContext<'_>,
    ) -> ExecutorResult<CycleOutcome> {
        let snapshot_id = ctx.snapshot.snapshot_id.clone();

        if self.state != CoordinatorState::Idle {
            let reason = format!("execute ignored: coordinator in state {}", self.state);
            self.audit
                .append(AuditRecord::note(snapshot_id, reason.clone()))?;
            return Ok(CycleOutcome::Held { reason });
        }

        let entry_price = ctx.quote.entry_price(side);
        let units = sizing::position_units(
            ctx.snapshot.equity,
            ctx.leverage,
            entry_price,
            self.config.min_lot_unit,
        );
        if units.is_zero() {
            let reason = "computed size is zero".to_string();
            self.audit
                .append(AuditRecord::note(snapshot_id, reason.clone()))?;
            return Ok(CycleOutcome::Held { reason });
        }

        // Constructor enforces armed + flat; a refusal is a veto, not a bug.
        let intent =
            match OrderIntent::open(&self.config.pair, side, units, &ctx.lock, ctx.snapshot) {
                Ok(intent) => intent,
                Err(e) => {
                    let reason = e.to_string();
                    self.audit
                        .append(AuditRecord::note(snapshot_id, format!("open refused: {reason}")))?;
                    return Ok(CycleOutcome::Held { reason });
                }
            };

        // Intent record durable BEFORE dispatch. On failure the call is
        // never made and the state never leaves IDLE.
        self.audit.append(AuditRecord::intent(
            snapshot_id.clone(),
            intent.clone(),
            ctx.lock,
            "open intent",
        ))?;
        self.commit(CoordinatorState::Submitting);

        info!(key = %intent.key, %side, size = %intent.size, "Submitting open order");

        let outcome = match self.gateway.submit(&intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Gateway errors are pre-dispatch by contract: nothing was
                // sent, so returning to IDLE is safe.
                let reason = e.to_string();
                self.audit.append(AuditRecord::note(
                    snapshot_id,
                    format!("open not dispatched: {reason}"),
                ))?;
                self.commit(CoordinatorState::Idle);
                return Ok(CycleOutcome::SafetyBlocked { reason });
            }
        };

        // Outcome record durable BEFORE the transition commits.
        if let Err(e) = self.audit.append(AuditRecord::outcome(
            snapshot_id,
            intent.clone(),
            outcome.clone(),
            "open result",
        )) {
            self.force_halt("audit failure after open dispatch");
            return Err(e.into());
        }

        match outcome {
            OrderOutcome::Confirmed { exchange_order_id } => {
                let position = self.resolve_open_position(&intent, &exchange_order_id, ctx).await;
                let position_id = position.id.clone();
                self.position = Some(position);
                self.commit(CoordinatorState::ConfirmedOpen);
                info!(%position_id, order_id = %exchange_order_id, "Position opened");
                Ok(CycleOutcome::Opened {
                    position_id,
                    exchange_order_id,
                    side,
                })
            }
            OrderOutcome::Rejected { reason } => {
                self.commit(CoordinatorState::Idle);
                info!(%reason, "Open rejected by exchange");
                Ok(CycleOutcome::OpenRejected { reason })
            }
            OrderOutcome::Ambiguous { detail } => {
                error!(%detail, "Ambiguous open outcome; halting");
                self.force_halt(&detail);
                Ok(CycleOutcome::Halted { reason: detail })
            }
        }
    }

    // ------------------------------------------------------------------
    // Close flow: CONFIRMED_OPEN -> SUBMITTING_CLOSE
    //   -> {CONFIRMED_CLOSED -> IDLE, CONFIRMED_OPEN, HALTED}
    // ------------------------------------------------------------------

    async fn close_position(
        &mut self,
        reason: &str,
        ctx: &CycleContext<'_>,
    ) -> ExecutorResult<CycleOutcome> {
        let snapshot_id = ctx.snapshot.snapshot_id.clone();

        if self.state != CoordinatorState::ConfirmedOpen {
            self.audit.append(AuditRecord::note(
                snapshot_id,
                format!("force close ({reason}) with no open position"),
            ))?;
            return Ok(CycleOutcome::NothingToClose);
        }

        // The settle order must target the position id the exchange knows.
        // Re-read authoritatively rather than trusting tracked state.
        let mut positions = self.gateway.open_positions(&self.config.pair).await?;

        if positions.is_empty() {
            // We believed a position was open; the exchange disagrees.
            // The read IS the authoritative state: reconcile to flat.
            self.audit.append(AuditRecord::note(
                snapshot_id,
                "close requested but exchange reports flat; reconciled to idle",
            ))?;
            self.position = None;
            self.commit(CoordinatorState::Idle);
            return Ok(CycleOutcome::NothingToClose);
        }
        if positions.len() > 1 {
            // Position cap breached on the exchange side. Operator only.
            let detail = format!("{} open positions found; cap is 1", positions.len());
            self.audit
                .append(AuditRecord::note(snapshot_id, detail.clone()))?;
            self.force_halt(&detail);
            return Ok(CycleOutcome::Halted { reason: detail });
        }
        let target = positions.remove(0);

        let intent = OrderIntent::close(
            &self.config.pair,
            target.side.opposite(),
            target.size,
            target.id.clone(),
        )?;

        self.audit.append(AuditRecord::intent(
            snapshot_id.clone(),
            intent.clone(),
            ctx.lock,
            format!("close intent ({reason})"),
        ))?;
        self.commit(CoordinatorState::SubmittingClose);

        info!(key = %intent.key, position_id = %target.id, %reason, "Submitting close order");

        let outcome = match self.gateway.submit(&intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = e.to_string();
                self.audit.append(AuditRecord::note(
                    snapshot_id,
                    format!("close not dispatched: {reason}"),
                ))?;
                self.commit(CoordinatorState::ConfirmedOpen);
                return Ok(CycleOutcome::SafetyBlocked { reason });
            }
        };

        if let Err(e) = self.audit.append(AuditRecord::outcome(
            snapshot_id,
            intent.clone(),
            outcome.clone(),
            "close result",
        )) {
            self.force_halt("audit failure after close dispatch");
            return Err(e.into());
        }

        match outcome {
            OrderOutcome::Confirmed { .. } => {
                let position_id = target.id.clone();
                self.position = None;
                self.commit(CoordinatorState::ConfirmedClosed);
                self.commit(CoordinatorState::Idle);
                info!(%position_id, "Position closed");
                Ok(CycleOutcome::Closed { position_id })
            }
            OrderOutcome::Rejected { reason } => {
                // The exchange says the position still exists.
                self.commit(CoordinatorState::ConfirmedOpen);
                warn!(%reason, "Close rejected by exchange; position stands");
                Ok(CycleOutcome::CloseRejected { reason })
            }
            OrderOutcome::Ambiguous { detail } => {
                error!(%detail, "Ambiguous close outcome; halting");
                self.force_halt(&detail);
                Ok(CycleOutcome::Halted { reason: detail })
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// After a confirmed open, prefer the exchange's view of the new
    /// position (it carries the real position id). Falls back to a
    /// synthesized position when the read fails; the close flow re-reads
    /// authoritatively anyway.
    async fn resolve_open_position(
        &self,
        intent: &OrderIntent,
        exchange_order_id: &str,
        ctx: &CycleContext<'_>,
    ) -> Position {
        match self.gateway.open_positions(&self.config.pair).await {
            Ok(mut positions) if positions.len() == 1 => positions.remove(0),
            Ok(positions) => {
                warn!(
                    count = positions.len(),
                    "Unexpected position count after confirmed open; synthesizing"
                );
                self.synthesize_position(intent, exchange_order_id, ctx)
            }
            Err(e) => {
                warn!(error = %e, "Position read failed after confirmed open; synthesizing");
                self.synthesize_position(intent, exchange_order_id, ctx)
            }
        }
    }

    fn synthesize_position(
        &self,
        intent: &OrderIntent,
        exchange_order_id: &str,
        ctx: &CycleContext<'_>,
    ) -> Position {
        Position {
            id: PositionId::new(exchange_order_id),
            pair: self.config.pair.clone(),
            side: intent.side,
            size: intent.size,
            entry_price: ctx.quote.entry_price(intent.side),
            opened_at: Utc::now(),
            swap_accrued: Price::ZERO,
        }
    }

    /// Commit a state transition. The audit log is the source of truth
    /// for recovery; the state file is a best-effort hint, so a persist
    /// failure is logged but does not abort a transition whose outcome
    /// record is already durable.
    pub(crate) fn commit(&mut self, next: CoordinatorState) {
        self.state = next;
        let persisted = PersistedState {
            state: self.state,
            position: self.position.clone(),
        };
        if let Err(e) = self.store.save(&persisted) {
            warn!(error = %e, "Failed to persist coordinator state");
        }
    }

    pub(crate) fn force_halt(&mut self, reason: &str) {
        error!(%reason, "COORDINATOR HALTED");
        self.commit(CoordinatorState::Halted);
    }

    pub(crate) fn set_recovered(&mut self, state: CoordinatorState, position: Option<Position>) {
        self.position = position;
        self.state = state;
    }

    pub(crate) fn audit_mut(&mut self) -> &mut AuditLog {
        &mut self.audit
    }

    pub(crate) fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub(crate) fn pair(&self) -> &str {
        &self.config.pair
    }

    pub(crate) fn store_hint(&self) -> Option<PersistedState> {
        self.store.load()
    }
}
