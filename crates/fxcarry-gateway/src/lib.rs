//! Exchange gateway.
//!
//! Two very different call classes share this crate:
//! - Idempotent GETs (rates, account, open positions): wrapped by a shared
//!   token-bucket rate limiter and retried with bounded backoff.
//! - Private POSTs (open, settle): signed, dispatched AT MOST ONCE, and
//!   classified three ways. A timeout or malformed response is AMBIGUOUS,
//!   never assumed rejected or confirmed.

pub mod error;
pub mod rate_limit;
pub mod rest;
pub mod sign;
pub mod traits;

pub use error::{GatewayError, GatewayResult};
pub use rate_limit::{BackoffConfig, RateLimiter};
pub use rest::{ForexRestGateway, GatewayConfig, SwapOverride};
pub use sign::ApiCredentials;
pub use traits::ExchangeGateway;
