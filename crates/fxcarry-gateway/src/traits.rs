//! The exchange gateway seam.

use async_trait::async_trait;

use fxcarry_core::{AccountSnapshot, MarketQuote, OrderIntent, OrderOutcome, Position};

use crate::error::GatewayResult;

/// Abstraction over the exchange's public/private, GET/POST surface.
///
/// Contract:
/// - `market_quote`, `account_snapshot`, `open_positions` are idempotent
///   reads, retryable under the shared rate limiter.
/// - `submit` dispatches a mutating call AT MOST ONCE per intent. It never
///   retries internally; any post-dispatch timeout or malformed response
///   comes back as `OrderOutcome::Ambiguous`. Errors are returned only for
///   failures that provably happened before dispatch.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Latest quote (rates and swap points) for the pair.
    async fn market_quote(&self, pair: &str) -> GatewayResult<MarketQuote>;

    /// Authoritative account state: equity, margin ratio, open positions.
    async fn account_snapshot(&self, pair: &str) -> GatewayResult<AccountSnapshot>;

    /// Authoritative open-position read, used for reconciliation.
    async fn open_positions(&self, pair: &str) -> GatewayResult<Vec<Position>>;

    /// Dispatch an open or close order. At most one attempt per intent.
    async fn submit(&self, intent: &OrderIntent) -> GatewayResult<OrderOutcome>;
}
