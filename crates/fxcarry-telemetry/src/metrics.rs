//! Prometheus metrics for the trading core.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure (duplicate name) is a fatal configuration error that should
//! crash at startup, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

/// Total decision cycles executed.
pub static CYCLES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("fxcarry_cycles_total", "Total decision cycles executed").unwrap()
});

/// Decisions by kind (execute / hold / force_close).
pub static DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxcarry_decisions_total",
        "Authorization decisions by kind",
        &["kind"]
    )
    .unwrap()
});

/// Mutating submissions by classified outcome.
pub static SUBMITS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxcarry_submits_total",
        "Mutating order submissions by outcome",
        &["action", "outcome"]
    )
    .unwrap()
});

/// Kill-switch fires.
pub static KILL_SWITCH_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("fxcarry_kill_switch_total", "Kill-switch fires").unwrap()
});

/// Transitions into HALTED.
pub static HALTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fxcarry_halts_total",
        "Transitions into the halted state requiring manual reconciliation"
    )
    .unwrap()
});

/// Oracle consultations by result (ok / error / skipped).
pub static ORACLE_CALLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxcarry_oracle_calls_total",
        "Proposal oracle consultations by result",
        &["result"]
    )
    .unwrap()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        CYCLES_TOTAL.inc();
        DECISIONS_TOTAL.with_label_values(&["hold"]).inc();
        SUBMITS_TOTAL.with_label_values(&["open", "confirmed"]).inc();
        assert!(CYCLES_TOTAL.get() >= 1);
    }
}
