//! Execution coordinator.
//!
//! Owns the position lifecycle and the only code path that dispatches
//! mutating exchange calls. One decision/execution cycle runs at a time;
//! at most one order intent is ever in flight. Mutating calls are never
//! retried: a retried duplicate open risks breaching the position cap and
//! a retried duplicate close risks double-settlement. Anything non-definite
//! halts the machine for a human.

pub mod coordinator;
pub mod error;
pub mod reconcile;
pub mod sizing;
pub mod state_store;

pub use coordinator::{
    CoordinatorState, CycleContext, CycleOutcome, ExecutionCoordinator, ExecutorConfig,
};
pub use error::{ExecutorError, ExecutorResult};
pub use state_store::{PersistedState, StateStore};
