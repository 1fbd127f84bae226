//! Application wiring and the decision/execution loop.
//!
//! Cycle order is fixed: read account and market state, evaluate the kill
//! switch (before and independent of oracle latency), consult the oracle
//! if warranted, gate-validate the proposal, authorize through the
//! interlock, then hand the decision to the coordinator. The coordinator
//! lives behind an async mutex: at most one order intent is in flight,
//! and a stop signal takes effect at the next safe decision point rather
//! than aborting a dispatched call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use fxcarry_core::{AccountSnapshot, Decision, MarketQuote, Proposal};
use fxcarry_executor::{
    CoordinatorState, CycleContext, CycleOutcome, ExecutionCoordinator, ExecutorConfig, StateStore,
};
use fxcarry_gateway::{ApiCredentials, ExchangeGateway, ForexRestGateway};
use fxcarry_interlock::{ArmingControl, KillSwitch, SafetyInterlock};
use fxcarry_notify::{Notifier, NotifyLevel};
use fxcarry_oracle::{
    NewsClient, OpenAiOracle, OraclePayload, ProposalGate, ProposalOracle, StaticNewsClient,
};
use fxcarry_telemetry::metrics;

use fxcarry_audit::AuditLog;

use crate::config::AppConfig;
use crate::error::AppResult;

/// The assembled application.
pub struct Application {
    config: AppConfig,
    gateway: Arc<ForexRestGateway>,
    interlock: SafetyInterlock,
    gate: ProposalGate,
    oracle: Option<Box<dyn ProposalOracle>>,
    news: Box<dyn NewsClient>,
    coordinator: Mutex<ExecutionCoordinator<ForexRestGateway>>,
    notifier: Notifier,
    last_oracle_call: Option<Instant>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let api_key = std::env::var("FXCARRY_API_KEY").unwrap_or_default();
        let api_secret = std::env::var("FXCARRY_API_SECRET").unwrap_or_default();
        if api_key.is_empty() || api_secret.is_empty() {
            warn!("Exchange credentials missing; private API calls will fail");
        }

        let arming = ArmingControl::new(config.enable_live_trading, config.arm_env_var.clone());
        let gateway = Arc::new(ForexRestGateway::new(
            config.gateway.clone(),
            ApiCredentials::new(api_key, api_secret),
            arming.clone(),
        )?);

        let interlock = SafetyInterlock::new(arming, KillSwitch::new(config.kill_switch.clone()));
        let gate = ProposalGate::new(config.max_leverage);

        let oracle: Option<Box<dyn ProposalOracle>> = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => {
                Some(Box::new(OpenAiOracle::new(config.oracle.clone(), key)?))
            }
            _ => {
                warn!("OPENAI_API_KEY not set; every proposal degrades to HOLD");
                None
            }
        };

        let audit = AuditLog::open(&config.audit_path)?;
        let store = StateStore::new(&config.state_path);
        let coordinator = ExecutionCoordinator::new(
            ExecutorConfig {
                pair: config.pair.clone(),
                min_lot_unit: config.min_lot_unit,
            },
            Arc::clone(&gateway),
            audit,
            store,
        );

        let notifier = Notifier::new(std::env::var("FXCARRY_WEBHOOK_URL").ok());

        Ok(Self {
            config,
            gateway,
            interlock,
            gate,
            oracle,
            news: Box::new(StaticNewsClient),
            coordinator: Mutex::new(coordinator),
            notifier,
            last_oracle_call: None,
        })
    }

    /// One-shot operator reconciliation (`--reconcile`).
    pub async fn reconcile_once(&self) -> AppResult<CoordinatorState> {
        let mut coordinator = self.coordinator.lock().await;
        let state = coordinator.recover().await?;
        info!(%state, "Operator reconciliation finished");
        Ok(state)
    }

    /// Run the main loop until ctrl-c.
    pub async fn run(mut self) -> AppResult<()> {
        self.config.check_swap_freshness();

        // Restart rule: reconcile against an authoritative read before
        // resuming. A persisted CONFIRMED_OPEN is never trusted blindly.
        {
            let mut coordinator = self.coordinator.lock().await;
            let state = coordinator.recover().await?;
            if state == CoordinatorState::Halted {
                self.notifier.send(
                    "Recovered into HALTED: manual intervention required",
                    NotifyLevel::Critical,
                );
            }
        }

        let lock = self.interlock.lock_state();
        if lock.armed() {
            warn!("LIVE TRADING FULLY ARMED. Real orders WILL be sent.");
            self.notifier
                .send("fxcarry started (LIVE mode)", NotifyLevel::Warning);
            tokio::time::sleep(Duration::from_secs(5)).await;
        } else {
            info!(%lock, "Running disarmed (dry-run); mutating calls are blocked");
        }

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.cycle_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.cycle().await {
                        error!(error = %e, "Cycle failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One decision/execution cycle.
    async fn cycle(&mut self) -> AppResult<()> {
        metrics::CYCLES_TOTAL.inc();

        let quote = self.gateway.market_quote(&self.config.pair).await?;
        let snapshot = self.gateway.account_snapshot(&self.config.pair).await?;

        // Kill switch first: a deteriorating account must not wait on the
        // oracle.
        let verdict = self.interlock.pre_check(&snapshot);
        let proposal = if verdict.is_tripped() {
            metrics::ORACLE_CALLS_TOTAL
                .with_label_values(&["skipped"])
                .inc();
            Proposal::hold(
                "kill switch active; oracle not consulted",
                snapshot.snapshot_id.clone(),
            )
        } else {
            self.consult_oracle(&snapshot, &quote).await
        };

        let (decision, lock) = self.interlock.authorize(&proposal, &snapshot);
        let kind = match &decision {
            Decision::Execute { .. } => "execute",
            Decision::Hold { .. } => "hold",
            Decision::ForceClose { .. } => "force_close",
        };
        metrics::DECISIONS_TOTAL.with_label_values(&[kind]).inc();
        if let Decision::ForceClose { reason } = &decision {
            metrics::KILL_SWITCH_TOTAL.inc();
            self.notifier
                .send(format!("Kill switch: {reason}"), NotifyLevel::Warning);
        }

        let outcome = {
            let mut coordinator = self.coordinator.lock().await;
            coordinator
                .apply(
                    decision,
                    CycleContext {
                        snapshot: &snapshot,
                        quote: &quote,
                        lock,
                        leverage: proposal.suggested_leverage,
                    },
                )
                .await?
        };

        self.observe_outcome(&outcome);
        Ok(())
    }

    async fn consult_oracle(
        &mut self,
        snapshot: &AccountSnapshot,
        quote: &MarketQuote,
    ) -> Proposal {
        let Some(oracle) = &self.oracle else {
            return Proposal::hold("no oracle configured", snapshot.snapshot_id.clone());
        };

        // Cost control: skip consultations inside the minimum interval.
        let interval = Duration::from_secs(self.config.oracle_interval_secs);
        if let Some(last) = self.last_oracle_call {
            if last.elapsed() < interval {
                metrics::ORACLE_CALLS_TOTAL
                    .with_label_values(&["skipped"])
                    .inc();
                return Proposal::hold(
                    format!(
                        "oracle skipped: {}s since last call",
                        last.elapsed().as_secs()
                    ),
                    snapshot.snapshot_id.clone(),
                );
            }
        }

        let payload = OraclePayload {
            request_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            snapshot_id: snapshot.snapshot_id.clone(),
            market: quote.clone(),
            positions: snapshot.open_positions.clone(),
            news: self.news.recent(&self.config.pair, self.config.news_limit).await,
        };

        let raw = oracle.propose(&payload).await;
        let result_label = if raw.is_ok() { "ok" } else { "error" };
        metrics::ORACLE_CALLS_TOTAL
            .with_label_values(&[result_label])
            .inc();
        if raw.is_ok() {
            self.last_oracle_call = Some(Instant::now());
        }

        self.gate.sanitize(raw, snapshot.snapshot_id.clone())
    }

    fn observe_outcome(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Held { reason } => {
                info!(%reason, "Cycle held");
            }
            CycleOutcome::Opened {
                position_id,
                exchange_order_id,
                side,
            } => {
                metrics::SUBMITS_TOTAL
                    .with_label_values(&["open", "confirmed"])
                    .inc();
                self.notifier.send(
                    format!("Opened {side} position {position_id} (order {exchange_order_id})"),
                    NotifyLevel::Info,
                );
            }
            CycleOutcome::Closed { position_id } => {
                metrics::SUBMITS_TOTAL
                    .with_label_values(&["close", "confirmed"])
                    .inc();
                self.notifier.send(
                    format!("Closed position {position_id}"),
                    NotifyLevel::Info,
                );
            }
            CycleOutcome::OpenRejected { reason } => {
                metrics::SUBMITS_TOTAL
                    .with_label_values(&["open", "rejected"])
                    .inc();
                self.notifier
                    .send(format!("Open rejected: {reason}"), NotifyLevel::Warning);
            }
            CycleOutcome::CloseRejected { reason } => {
                metrics::SUBMITS_TOTAL
                    .with_label_values(&["close", "rejected"])
                    .inc();
                self.notifier
                    .send(format!("Close rejected: {reason}"), NotifyLevel::Warning);
            }
            CycleOutcome::Halted { reason } => {
                metrics::HALTS_TOTAL.inc();
                self.notifier.send(
                    format!("HALTED, manual reconciliation required: {reason}"),
                    NotifyLevel::Critical,
                );
            }
            CycleOutcome::SafetyBlocked { reason } => {
                warn!(%reason, "Mutating call blocked before dispatch");
            }
            CycleOutcome::NothingToClose => {
                info!("Force close requested but account is flat");
            }
        }
    }
}
