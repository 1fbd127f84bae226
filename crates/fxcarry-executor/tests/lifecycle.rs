//! End-to-end state machine tests with a scripted gateway.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal_macros::dec;

use fxcarry_audit::{AuditLog, AuditRecord};
use fxcarry_core::{
    AccountSnapshot, Decision, LockState, MarketQuote, OrderAction, OrderIntent, OrderOutcome,
    OrderSide, Position, PositionId, Price, Size, SnapshotId,
};
use fxcarry_executor::{
    CoordinatorState, CycleContext, CycleOutcome, ExecutionCoordinator, ExecutorConfig,
    PersistedState, StateStore,
};
use fxcarry_gateway::{ExchangeGateway, GatewayResult};

// ----------------------------------------------------------------------
// Scripted gateway
// ----------------------------------------------------------------------

struct ScriptedGateway {
    outcomes: Mutex<VecDeque<GatewayResult<OrderOutcome>>>,
    submissions: Mutex<Vec<OrderIntent>>,
    positions: Mutex<Vec<Position>>,
}

impl ScriptedGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
        })
    }

    fn push_outcome(&self, outcome: GatewayResult<OrderOutcome>) {
        self.outcomes.lock().push_back(outcome);
    }

    fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock() = positions;
    }

    fn submissions(&self) -> Vec<OrderIntent> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn market_quote(&self, pair: &str) -> GatewayResult<MarketQuote> {
        Ok(quote(pair))
    }

    async fn account_snapshot(&self, _pair: &str) -> GatewayResult<AccountSnapshot> {
        Ok(snapshot_with(self.positions.lock().clone()))
    }

    async fn open_positions(&self, _pair: &str) -> GatewayResult<Vec<Position>> {
        Ok(self.positions.lock().clone())
    }

    async fn submit(&self, intent: &OrderIntent) -> GatewayResult<OrderOutcome> {
        self.submissions.lock().push(intent.clone());
        self.outcomes
            .lock()
            .pop_front()
            .expect("unexpected submit: no scripted outcome left")
    }
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

fn quote(pair: &str) -> MarketQuote {
    MarketQuote {
        pair: pair.to_string(),
        bid: Price::new(dec!(149.98)),
        ask: Price::new(dec!(150.00)),
        swap_long_per_day: dec!(15),
        swap_short_per_day: dec!(-18),
        timestamp: Utc::now(),
    }
}

fn snapshot_with(positions: Vec<Position>) -> AccountSnapshot {
    AccountSnapshot {
        snapshot_id: SnapshotId::new(),
        equity: Price::new(dec!(1500000)),
        margin_ratio: dec!(5.0),
        open_positions: positions,
        timestamp: Utc::now(),
    }
}

fn open_position(id: &str) -> Position {
    Position {
        id: PositionId::new(id),
        pair: "USD_JPY".to_string(),
        side: OrderSide::Buy,
        size: Size::new(dec!(20000)),
        entry_price: Price::new(dec!(150.00)),
        opened_at: Utc::now(),
        swap_accrued: Price::ZERO,
    }
}

fn armed() -> LockState {
    LockState {
        config_flag_armed: true,
        env_flag_armed: true,
    }
}

struct TestRig {
    coordinator: ExecutionCoordinator<ScriptedGateway>,
    gateway: Arc<ScriptedGateway>,
    audit_path: PathBuf,
    state_path: PathBuf,
}

impl TestRig {
    fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        let audit_path = std::env::temp_dir().join(format!("fxcarry_lifecycle_{id}.jsonl"));
        let state_path = std::env::temp_dir().join(format!("fxcarry_lifecycle_{id}.json"));

        let gateway = ScriptedGateway::new();
        let coordinator = ExecutionCoordinator::new(
            ExecutorConfig {
                pair: "USD_JPY".to_string(),
                min_lot_unit: dec!(1000),
            },
            Arc::clone(&gateway),
            AuditLog::open(&audit_path).unwrap(),
            StateStore::new(&state_path),
        );

        Self {
            coordinator,
            gateway,
            audit_path,
            state_path,
        }
    }

    fn audit_records(&self) -> Vec<AuditRecord> {
        let content = std::fs::read_to_string(&self.audit_path).unwrap();
        content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

impl Drop for TestRig {
    fn drop(&mut self) {
        std::fs::remove_file(&self.audit_path).ok();
        std::fs::remove_file(&self.state_path).ok();
    }
}

async fn execute_buy(rig: &mut TestRig) -> CycleOutcome {
    let snapshot = snapshot_with(vec![]);
    let q = quote("USD_JPY");
    rig.coordinator
        .apply(
            Decision::Execute {
                side: OrderSide::Buy,
            },
            CycleContext {
                snapshot: &snapshot,
                quote: &q,
                lock: armed(),
                leverage: dec!(2),
            },
        )
        .await
        .unwrap()
}

async fn force_close(rig: &mut TestRig, reason: &str) -> CycleOutcome {
    let snapshot = snapshot_with(rig.gateway.positions.lock().clone());
    let q = quote("USD_JPY");
    rig.coordinator
        .apply(
            Decision::ForceClose {
                reason: reason.to_string(),
            },
            CycleContext {
                snapshot: &snapshot,
                quote: &q,
                lock: armed(),
                leverage: dec!(2),
            },
        )
        .await
        .unwrap()
}

// ----------------------------------------------------------------------
// Open flow
// ----------------------------------------------------------------------

#[tokio::test]
async fn confirmed_open_transitions_to_confirmed_open() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X1".to_string(),
    }));

    let outcome = execute_buy(&mut rig).await;

    match outcome {
        CycleOutcome::Opened {
            exchange_order_id, side, ..
        } => {
            assert_eq!(exchange_order_id, "X1");
            assert_eq!(side, OrderSide::Buy);
        }
        other => panic!("expected opened, got {other:?}"),
    }
    assert_eq!(rig.coordinator.state(), CoordinatorState::ConfirmedOpen);
    assert!(rig.coordinator.position().is_some());

    // Sizing: 1,500,000 equity * 2x / 150.00 ask = 20,000 units.
    let submissions = rig.gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].action, OrderAction::Open);
    assert_eq!(submissions[0].size, Size::new(dec!(20000)));
}

#[tokio::test]
async fn audit_has_ordered_decision_intent_and_result() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X1".to_string(),
    }));

    execute_buy(&mut rig).await;

    let records = rig.audit_records();
    assert!(records.windows(2).all(|w| w[0].seq < w[1].seq));

    let decision_idx = records.iter().position(|r| r.decision.is_some()).unwrap();
    let intent_idx = records
        .iter()
        .position(|r| r.order_intent.is_some() && r.order_outcome.is_none())
        .unwrap();
    let outcome_idx = records.iter().position(|r| r.order_outcome.is_some()).unwrap();

    assert!(decision_idx < intent_idx, "decision before intent");
    assert!(intent_idx < outcome_idx, "intent audited before result");
}

#[tokio::test]
async fn rejected_open_returns_to_idle() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Rejected {
        reason: "insufficient margin".to_string(),
    }));

    let outcome = execute_buy(&mut rig).await;

    assert!(matches!(outcome, CycleOutcome::OpenRejected { .. }));
    assert_eq!(rig.coordinator.state(), CoordinatorState::Idle);
    assert!(rig.coordinator.position().is_none());
}

#[tokio::test]
async fn ambiguous_open_halts_with_exactly_one_attempt() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Ambiguous {
        detail: "timeout".to_string(),
    }));

    let outcome = execute_buy(&mut rig).await;
    assert!(matches!(outcome, CycleOutcome::Halted { .. }));
    assert_eq!(rig.coordinator.state(), CoordinatorState::Halted);

    // A subsequent Execute is ignored: no second dispatch, ever.
    let outcome = execute_buy(&mut rig).await;
    assert!(matches!(outcome, CycleOutcome::Halted { .. }));
    assert_eq!(rig.gateway.submissions().len(), 1);
}

#[tokio::test]
async fn pre_dispatch_gateway_refusal_returns_to_idle() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Err(
        fxcarry_gateway::GatewayError::SafetyBlocked("lock dropped".to_string()),
    ));

    let outcome = execute_buy(&mut rig).await;

    assert!(matches!(outcome, CycleOutcome::SafetyBlocked { .. }));
    assert_eq!(rig.coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn each_attempt_gets_a_fresh_idempotency_key() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Rejected {
        reason: "first".to_string(),
    }));
    rig.gateway.push_outcome(Ok(OrderOutcome::Rejected {
        reason: "second".to_string(),
    }));

    execute_buy(&mut rig).await;
    execute_buy(&mut rig).await;

    let submissions = rig.gateway.submissions();
    assert_eq!(submissions.len(), 2);
    assert_ne!(submissions[0].key, submissions[1].key);
}

// ----------------------------------------------------------------------
// Close flow
// ----------------------------------------------------------------------

#[tokio::test]
async fn confirmed_close_returns_to_idle() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X1".to_string(),
    }));
    rig.gateway.set_positions(vec![open_position("p-77")]);
    execute_buy(&mut rig).await;

    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "C1".to_string(),
    }));
    let outcome = force_close(&mut rig, "margin floor").await;

    assert_eq!(
        outcome,
        CycleOutcome::Closed {
            position_id: PositionId::new("p-77")
        }
    );
    assert_eq!(rig.coordinator.state(), CoordinatorState::Idle);
    assert!(rig.coordinator.position().is_none());

    // The settle order targeted the exchange's position id, opposite side.
    let submissions = rig.gateway.submissions();
    let close = &submissions[1];
    assert_eq!(close.action, OrderAction::Close);
    assert_eq!(close.side, OrderSide::Sell);
    assert_eq!(close.position_id, Some(PositionId::new("p-77")));
}

#[tokio::test]
async fn close_timeout_halts_and_blocks_further_executes() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X1".to_string(),
    }));
    rig.gateway.set_positions(vec![open_position("p-77")]);
    execute_buy(&mut rig).await;

    rig.gateway.push_outcome(Ok(OrderOutcome::Ambiguous {
        detail: "close timed out".to_string(),
    }));
    let outcome = force_close(&mut rig, "margin floor").await;
    assert!(matches!(outcome, CycleOutcome::Halted { .. }));
    assert_eq!(rig.coordinator.state(), CoordinatorState::Halted);

    // Execute proposals are ignored until reconciliation.
    let outcome = execute_buy(&mut rig).await;
    assert!(matches!(outcome, CycleOutcome::Halted { .. }));
    assert_eq!(rig.gateway.submissions().len(), 2);
}

#[tokio::test]
async fn rejected_close_keeps_position_open() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X1".to_string(),
    }));
    rig.gateway.set_positions(vec![open_position("p-77")]);
    execute_buy(&mut rig).await;

    rig.gateway.push_outcome(Ok(OrderOutcome::Rejected {
        reason: "market closed".to_string(),
    }));
    let outcome = force_close(&mut rig, "margin floor").await;

    assert!(matches!(outcome, CycleOutcome::CloseRejected { .. }));
    assert_eq!(rig.coordinator.state(), CoordinatorState::ConfirmedOpen);
    assert!(rig.coordinator.position().is_some());
}

#[tokio::test]
async fn force_close_when_flat_is_a_noop() {
    let mut rig = TestRig::new();
    let outcome = force_close(&mut rig, "margin floor").await;
    assert_eq!(outcome, CycleOutcome::NothingToClose);
    assert_eq!(rig.coordinator.state(), CoordinatorState::Idle);
    assert!(rig.gateway.submissions().is_empty());
}

#[tokio::test]
async fn close_reconciles_to_flat_when_exchange_disagrees() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X1".to_string(),
    }));
    rig.gateway.set_positions(vec![open_position("p-77")]);
    execute_buy(&mut rig).await;

    // The exchange now reports flat (e.g. stopped out server-side).
    rig.gateway.set_positions(vec![]);
    let outcome = force_close(&mut rig, "margin floor").await;

    assert_eq!(outcome, CycleOutcome::NothingToClose);
    assert_eq!(rig.coordinator.state(), CoordinatorState::Idle);
}

// ----------------------------------------------------------------------
// Recovery and reconciliation
// ----------------------------------------------------------------------

#[tokio::test]
async fn recover_does_not_trust_stale_confirmed_open() {
    let mut rig = TestRig::new();

    // Simulate a previous process that died holding CONFIRMED_OPEN.
    StateStore::new(&rig.state_path)
        .save(&PersistedState {
            state: CoordinatorState::ConfirmedOpen,
            position: Some(open_position("stale")),
        })
        .unwrap();

    // The exchange is flat: the stale position must be discarded.
    let state = rig.coordinator.recover().await.unwrap();
    assert_eq!(state, CoordinatorState::Idle);
    assert!(rig.coordinator.position().is_none());
}

#[tokio::test]
async fn recover_adopts_exchange_position() {
    let mut rig = TestRig::new();
    rig.gateway.set_positions(vec![open_position("p-9")]);

    let state = rig.coordinator.recover().await.unwrap();
    assert_eq!(state, CoordinatorState::ConfirmedOpen);
    assert_eq!(
        rig.coordinator.position().map(|p| p.id.clone()),
        Some(PositionId::new("p-9"))
    );
}

#[tokio::test]
async fn reconcile_clears_halted_state() {
    let mut rig = TestRig::new();
    rig.gateway.push_outcome(Ok(OrderOutcome::Ambiguous {
        detail: "timeout".to_string(),
    }));
    execute_buy(&mut rig).await;
    assert_eq!(rig.coordinator.state(), CoordinatorState::Halted);

    // Authoritative read says the order never executed.
    let state = rig.coordinator.reconcile("operator").await.unwrap();
    assert_eq!(state, CoordinatorState::Idle);

    // Trading may resume.
    rig.gateway.push_outcome(Ok(OrderOutcome::Confirmed {
        exchange_order_id: "X2".to_string(),
    }));
    let outcome = execute_buy(&mut rig).await;
    assert!(matches!(outcome, CycleOutcome::Opened { .. }));
}

#[tokio::test]
async fn reconcile_with_multiple_positions_stays_halted() {
    let mut rig = TestRig::new();
    rig.gateway
        .set_positions(vec![open_position("p-1"), open_position("p-2")]);

    let state = rig.coordinator.reconcile("operator").await.unwrap();
    assert_eq!(state, CoordinatorState::Halted);
}
