//! Error types for fxcarry-oracle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("API key missing")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Oracle call timed out: {0}")]
    Timeout(String),

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),
}

pub type OracleResult<T> = Result<T, OracleError>;
