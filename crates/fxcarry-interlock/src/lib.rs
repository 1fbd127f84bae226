//! Safety interlock for live trading.
//!
//! Nothing reaches the exchange's mutating surface without passing through
//! `SafetyInterlock::authorize`, which evaluates, in strict precedence
//! order: kill switch (force close), arming and position cap (hold), and
//! only then the strategy proposal (execute). When in doubt, hold.

pub mod arming;
pub mod interlock;
pub mod kill_switch;

pub use arming::ArmingControl;
pub use interlock::{SafetyInterlock, MAX_OPEN_POSITIONS};
pub use kill_switch::{KillSwitch, KillSwitchConfig, KillVerdict};
