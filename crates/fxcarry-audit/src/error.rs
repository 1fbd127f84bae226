//! Error types for fxcarry-audit.

use thiserror::Error;

/// Audit log error types.
///
/// Any of these is a `PersistenceFailure` from the coordinator's point of
/// view: a mutating call must not proceed unaudited.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;
