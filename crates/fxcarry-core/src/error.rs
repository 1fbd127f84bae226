//! Error types for fxcarry-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Open intent refused: {0}")]
    OpenIntentRefused(String),

    #[error("Close intent refused: {0}")]
    CloseIntentRefused(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
