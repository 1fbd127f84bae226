//! Error types for fxcarry-executor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Audit persistence failure. Fatal for the attempt: a mutating call
    /// must not proceed unaudited, and an unaudited outcome halts the
    /// machine.
    #[error("Audit persistence failure: {0}")]
    Audit(#[from] fxcarry_audit::AuditError),

    /// Read-path gateway failure (e.g. retry budget exhausted).
    #[error("Gateway error: {0}")]
    Gateway(#[from] fxcarry_gateway::GatewayError),

    /// Coordinator state could not be persisted.
    #[error("State store failure: {0}")]
    Store(String),

    /// Intent construction refused (arming or cap invariant).
    #[error("Intent error: {0}")]
    Intent(#[from] fxcarry_core::CoreError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
