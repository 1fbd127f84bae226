//! Error types for fxcarry-gateway.
//!
//! These errors cover the READ path and pre-dispatch failures only. Once a
//! mutating call has been dispatched, its result is an `OrderOutcome`, not
//! an error: a failure there may mean the order executed anyway.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Exchange returned an explicit rate-limit response on a read.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Read-call retry budget exhausted.
    #[error("Network timeout after {attempts} attempts: {detail}")]
    NetworkTimeout { attempts: u32, detail: String },

    /// Transport or HTTP-level failure on a read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Exchange rejected a read with an explicit error envelope.
    #[error("Exchange API error [{code}]: {message}")]
    Api { code: String, message: String },

    /// A response arrived but could not be interpreted (read path).
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Mutating call refused BEFORE dispatch: the two-stage lock is not
    /// armed. Nothing was sent; this is never ambiguous.
    #[error("Safety block: {0}")]
    SafetyBlocked(String),

    /// Mutating call refused BEFORE dispatch: this idempotency key was
    /// already attempted once.
    #[error("Duplicate idempotency key: {0}")]
    DuplicateKey(String),

    /// The intent is structurally unusable (e.g. a close without a
    /// position id). Indicates a coordinator bug; nothing was sent.
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),
}

impl GatewayError {
    /// Whether a read-path error is worth retrying under backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Http(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
