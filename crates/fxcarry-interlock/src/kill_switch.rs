//! Kill switch: forced closure on account-health deterioration.
//!
//! Trips when the maintenance-margin ratio falls below a configured floor
//! or when an operator sets the manual latch. Evaluated on every cycle
//! BEFORE the strategy proposal is consulted; a tripped verdict overrides
//! any Execute decision.
//!
//! After a margin-triggered fire, new entries stay blocked for a cooldown
//! window even if margin recovers. The manual latch never auto-resets.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use fxcarry_core::{AccountSnapshot, Clock, SystemClock};

/// Kill-switch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchConfig {
    /// Maintenance-margin ratio below which the switch fires.
    #[serde(default = "default_margin_ratio_floor")]
    pub margin_ratio_floor: Decimal,
    /// Seconds during which new entries stay blocked after a margin fire.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_margin_ratio_floor() -> Decimal {
    Decimal::ONE
}

fn default_cooldown_secs() -> u64 {
    3600
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            margin_ratio_floor: default_margin_ratio_floor(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Result of a kill-switch evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillVerdict {
    /// Nothing wrong; trading may proceed to the next check.
    Clear,
    /// Force closure of any open position; block everything else.
    Tripped { reason: String },
    /// Margin recovered but the post-fire cooldown still blocks entries.
    CoolingDown { remaining_ms: u64 },
}

impl KillVerdict {
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        matches!(self, Self::Tripped { .. })
    }
}

/// The kill switch itself.
///
/// Thread-safe; shared as `Arc<KillSwitch>` between the cycle task and any
/// operator control surface.
pub struct KillSwitch<C: Clock = SystemClock> {
    config: KillSwitchConfig,
    /// Manual latch (operator stop). Once set, stays set until reset.
    latched: AtomicBool,
    latch_reason: RwLock<Option<String>>,
    /// End of the margin-fire cooldown window (Unix ms, 0 = none).
    cooldown_until_ms: AtomicU64,
    clock: C,
}

impl KillSwitch<SystemClock> {
    #[must_use]
    pub fn new(config: KillSwitchConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> KillSwitch<C> {
    #[must_use]
    pub fn with_clock(config: KillSwitchConfig, clock: C) -> Self {
        Self {
            config,
            latched: AtomicBool::new(false),
            latch_reason: RwLock::new(None),
            cooldown_until_ms: AtomicU64::new(0),
            clock,
        }
    }

    /// Evaluate account health. Margin below the floor trips the switch
    /// and (re)arms the cooldown window.
    pub fn evaluate(&self, snapshot: &AccountSnapshot) -> KillVerdict {
        if self.latched.load(Ordering::SeqCst) {
            let reason = self
                .latch_reason
                .read()
                .clone()
                .unwrap_or_else(|| "manual stop".to_string());
            return KillVerdict::Tripped { reason };
        }

        if snapshot.margin_ratio < self.config.margin_ratio_floor {
            let until = self
                .clock
                .now_ms()
                .saturating_add(self.config.cooldown_secs * 1000);
            self.cooldown_until_ms.fetch_max(until, Ordering::SeqCst);
            let reason = format!(
                "margin ratio {} below floor {}",
                snapshot.margin_ratio, self.config.margin_ratio_floor
            );
            error!(
                margin_ratio = %snapshot.margin_ratio,
                floor = %self.config.margin_ratio_floor,
                "KILL SWITCH TRIPPED"
            );
            return KillVerdict::Tripped { reason };
        }

        let until = self.cooldown_until_ms.load(Ordering::SeqCst);
        let now = self.clock.now_ms();
        if now < until {
            return KillVerdict::CoolingDown {
                remaining_ms: until - now,
            };
        }

        KillVerdict::Clear
    }

    /// Set the manual latch. Idempotent; the first reason wins.
    pub fn trip_manual(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self
            .latched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.latch_reason.write() = Some(reason.clone());
            error!(%reason, "Manual kill switch set");
        } else {
            warn!(new_reason = %reason, "Kill switch already latched, keeping original reason");
        }
    }

    /// Clear the manual latch. Operator action only, after investigation.
    pub fn reset_manual(&self) {
        if self.latched.swap(false, Ordering::SeqCst) {
            let previous = self.latch_reason.write().take();
            info!(?previous, "Manual kill switch reset");
        }
    }

    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn config(&self) -> &KillSwitchConfig {
        &self.config
    }
}
