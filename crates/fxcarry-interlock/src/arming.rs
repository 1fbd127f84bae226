//! Two-stage arming control.
//!
//! Live trading requires BOTH a persisted configuration flag and a runtime
//! environment flag. The environment flag is re-read from the process
//! environment on every call; the lock state is never cached across a
//! decision cycle, so un-setting the variable disarms the system at the
//! next cycle without a restart.

use fxcarry_core::LockState;
use tracing::debug;

/// Default environment variable for the second stage of the lock.
pub const DEFAULT_ARM_ENV_VAR: &str = "FXCARRY_LIVE_ARMED";

/// Value the environment variable must hold to count as armed.
pub const ARM_ENV_VALUE: &str = "YES";

/// Derives the current `LockState` on demand.
#[derive(Debug, Clone)]
pub struct ArmingControl {
    /// The persisted configuration flag, loaded at startup.
    config_flag: bool,
    /// Name of the runtime environment flag.
    env_var: String,
}

impl ArmingControl {
    pub fn new(config_flag: bool, env_var: impl Into<String>) -> Self {
        Self {
            config_flag,
            env_var: env_var.into(),
        }
    }

    /// Re-derive the lock state. Called immediately before every
    /// execution attempt; the result must not be stored across cycles.
    #[must_use]
    pub fn current(&self) -> LockState {
        let env_flag_armed = std::env::var(&self.env_var)
            .map(|v| v == ARM_ENV_VALUE)
            .unwrap_or(false);

        let lock = LockState {
            config_flag_armed: self.config_flag,
            env_flag_armed,
        };
        debug!(%lock, "Lock state derived");
        lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own env var name: the process environment is
    // shared across the test harness threads.

    #[test]
    fn test_armed_requires_both_flags() {
        let var = "FXCARRY_TEST_ARM_BOTH";
        std::env::set_var(var, "YES");
        let control = ArmingControl::new(true, var);
        assert!(control.current().armed());
        std::env::remove_var(var);
    }

    #[test]
    fn test_missing_env_flag_disarms() {
        let var = "FXCARRY_TEST_ARM_MISSING";
        std::env::remove_var(var);
        let control = ArmingControl::new(true, var);
        let lock = control.current();
        assert!(lock.config_flag_armed);
        assert!(!lock.env_flag_armed);
        assert!(!lock.armed());
    }

    #[test]
    fn test_wrong_env_value_disarms() {
        let var = "FXCARRY_TEST_ARM_WRONG";
        std::env::set_var(var, "yes");
        let control = ArmingControl::new(true, var);
        assert!(!control.current().armed());
        std::env::remove_var(var);
    }

    #[test]
    fn test_config_flag_false_disarms() {
        let var = "FXCARRY_TEST_ARM_CONFIG_OFF";
        std::env::set_var(var, "YES");
        let control = ArmingControl::new(false, var);
        assert!(!control.current().armed());
        std::env::remove_var(var);
    }

    #[test]
    fn test_lock_state_tracks_live_environment() {
        let var = "FXCARRY_TEST_ARM_LIVE";
        let control = ArmingControl::new(true, var);

        std::env::set_var(var, "YES");
        assert!(control.current().armed());

        std::env::remove_var(var);
        assert!(!control.current().armed(), "must re-read env every call");
    }
}
