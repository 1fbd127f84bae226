//! Application configuration.
//!
//! Loaded from a TOML file. Secrets (exchange keys, oracle key, webhook)
//! come from the environment, never from the file.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use fxcarry_gateway::GatewayConfig;
use fxcarry_interlock::KillSwitchConfig;
use fxcarry_oracle::OracleConfig;

use crate::error::{AppError, AppResult};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Currency pair to trade (e.g. "USD_JPY", "MXN_JPY").
    pub pair: String,
    /// Seconds between decision cycles.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// First stage of the two-stage arm: the persisted configuration
    /// flag. The second stage is the runtime environment flag.
    #[serde(default)]
    pub enable_live_trading: bool,
    /// Name of the environment variable holding the second stage.
    #[serde(default = "default_arm_env_var")]
    pub arm_env_var: String,
    /// Broker minimum lot unit.
    #[serde(default = "default_min_lot_unit")]
    pub min_lot_unit: Decimal,
    /// Ceiling for the oracle's leverage suggestion.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,
    /// Minimum seconds between oracle consultations (cost control).
    #[serde(default = "default_oracle_interval_secs")]
    pub oracle_interval_secs: u64,
    /// Headlines per oracle consultation.
    #[serde(default = "default_news_limit")]
    pub news_limit: usize,
    /// Audit log path.
    #[serde(default = "default_audit_path")]
    pub audit_path: String,
    /// Coordinator state file path.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// Date the manual swap overrides were last reviewed (YYYY-MM-DD).
    #[serde(default)]
    pub swap_updated_at: Option<String>,
    #[serde(default)]
    pub kill_switch: KillSwitchConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_cycle_interval_secs() -> u64 {
    60
}

fn default_arm_env_var() -> String {
    fxcarry_interlock::arming::DEFAULT_ARM_ENV_VAR.to_string()
}

fn default_min_lot_unit() -> Decimal {
    Decimal::from(1000)
}

fn default_max_leverage() -> Decimal {
    Decimal::from(10)
}

fn default_oracle_interval_secs() -> u64 {
    3600
}

fn default_news_limit() -> usize {
    5
}

fn default_audit_path() -> String {
    "data/audit.jsonl".to_string()
}

fn default_state_path() -> String {
    "data/coordinator_state.json".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config {path}: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot be traded safely.
    pub fn validate(&self) -> AppResult<()> {
        if self.pair.is_empty() {
            return Err(AppError::Config("pair must not be empty".to_string()));
        }
        if self.min_lot_unit <= Decimal::ZERO {
            return Err(AppError::Config("min_lot_unit must be positive".to_string()));
        }
        if self.max_leverage <= Decimal::ZERO {
            return Err(AppError::Config("max_leverage must be positive".to_string()));
        }
        if self.kill_switch.margin_ratio_floor <= Decimal::ZERO {
            return Err(AppError::Config(
                "kill_switch.margin_ratio_floor must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Warn (and eventually scream) when the manual swap overrides go
    /// stale: swap points drive the whole strategy.
    pub fn check_swap_freshness(&self) {
        let Some(updated_at) = &self.swap_updated_at else {
            warn!("swap_updated_at not set; swap override freshness unknown");
            return;
        };
        match NaiveDate::parse_from_str(updated_at, "%Y-%m-%d") {
            Ok(date) => {
                let age_days = (Utc::now().date_naive() - date).num_days();
                if age_days > 14 {
                    error!(age_days, "Swap settings are too old");
                } else if age_days > 7 {
                    warn!(age_days, "Swap settings are getting stale");
                }
            }
            Err(_) => error!(updated_at = %updated_at, "Invalid date in swap_updated_at"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: AppConfig = toml::from_str(r#"pair = "USD_JPY""#).unwrap();
        assert_eq!(config.pair, "USD_JPY");
        assert_eq!(config.cycle_interval_secs, 60);
        assert!(!config.enable_live_trading, "must default to disarmed");
        assert_eq!(config.arm_env_var, "FXCARRY_LIVE_ARMED");
        assert_eq!(config.min_lot_unit, Decimal::from(1000));
    }

    #[test]
    fn test_full_config_parses() {
        let toml_str = r#"
            pair = "MXN_JPY"
            cycle_interval_secs = 30
            enable_live_trading = true
            max_leverage = 5
            swap_updated_at = "2026-08-01"

            [kill_switch]
            margin_ratio_floor = 1.2
            cooldown_secs = 1800

            [oracle]
            model = "gpt-5.1"
            timeout_secs = 20

            [gateway]
            timeout_secs = 8

            [gateway.swap_overrides.MXN_JPY]
            long = "18"
            short = "-21"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pair, "MXN_JPY");
        assert!(config.enable_live_trading);
        assert_eq!(config.oracle.model, "gpt-5.1");
        assert!(config.gateway.swap_overrides.contains_key("MXN_JPY"));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_pair_rejected() {
        let config: AppConfig = toml::from_str(r#"pair = """#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_lot_unit_rejected() {
        let config: AppConfig =
            toml::from_str("pair = \"USD_JPY\"\nmin_lot_unit = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
