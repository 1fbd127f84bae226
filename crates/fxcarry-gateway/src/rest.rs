//! Forex REST gateway (GMO-style wire format).
//!
//! The exchange exposes a public GET surface (ticker) and a private,
//! signed surface (account, open positions, order, closeOrder). Responses
//! use an envelope: `{"status": 0, "data": ...}` on success and
//! `{"status": N, "messages": [{message_code, message_string}]}` on error.
//!
//! Read calls go through the shared rate limiter and bounded retry.
//! Mutating calls are dispatched at most once, with two pre-dispatch
//! guards that cannot be bypassed here: the two-stage lock re-check and
//! the per-key at-most-once set.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use fxcarry_core::{
    AccountSnapshot, MarketQuote, OrderAction, OrderIntent, OrderOutcome, Position, PositionId,
    Price, Size, SnapshotId,
};
use fxcarry_interlock::ArmingControl;

use crate::error::{GatewayError, GatewayResult};
use crate::rate_limit::{BackoffConfig, RateLimiter};
use crate::sign::ApiCredentials;
use crate::traits::ExchangeGateway;

/// Manually maintained swap points for one pair (the exchange does not
/// serve them over the ticker API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapOverride {
    pub long: Decimal,
    pub short: Decimal,
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_private_url")]
    pub private_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Token-bucket capacity for reads.
    #[serde(default = "default_rate_capacity")]
    pub rate_capacity: u32,
    /// Token refill rate for reads (tokens per second). The private API
    /// allows one request per second; stay under it.
    #[serde(default = "default_rate_refill_per_sec")]
    pub rate_refill_per_sec: f64,
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Pair -> manual swap points.
    #[serde(default)]
    pub swap_overrides: HashMap<String, SwapOverride>,
}

fn default_public_url() -> String {
    "https://forex-api.coin.z.com/public".to_string()
}

fn default_private_url() -> String {
    "https://forex-api.coin.z.com/private".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_rate_capacity() -> u32 {
    2
}

fn default_rate_refill_per_sec() -> f64 {
    0.9
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
            private_url: default_private_url(),
            timeout_secs: default_timeout_secs(),
            rate_capacity: default_rate_capacity(),
            rate_refill_per_sec: default_rate_refill_per_sec(),
            backoff: BackoffConfig::default(),
            swap_overrides: HashMap::new(),
        }
    }
}

/// REST implementation of `ExchangeGateway`.
pub struct ForexRestGateway {
    config: GatewayConfig,
    credentials: ApiCredentials,
    arming: ArmingControl,
    client: Client,
    rate_limiter: RateLimiter,
    /// Idempotency keys already dispatched by this process.
    dispatched: Mutex<HashSet<String>>,
}

impl ForexRestGateway {
    pub fn new(
        config: GatewayConfig,
        credentials: ApiCredentials,
        arming: ArmingControl,
    ) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = RateLimiter::new(config.rate_capacity, config.rate_refill_per_sec);

        Ok(Self {
            config,
            credentials,
            arming,
            client,
            rate_limiter,
            dispatched: Mutex::new(HashSet::new()),
        })
    }

    // ------------------------------------------------------------------
    // Read path: rate-limited, retried with bounded backoff.
    // ------------------------------------------------------------------

    async fn get_with_retry(
        &self,
        private: bool,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<Value> {
        let mut last_err: Option<GatewayError> = None;

        for attempt in 1..=self.config.backoff.max_retries {
            self.rate_limiter.acquire().await;

            match self.try_get(private, path, query).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() => {
                    warn!(path, attempt, error = %e, "Read failed, backing off");
                    last_err = Some(e);
                    tokio::time::sleep(self.config.backoff.delay_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::NetworkTimeout {
            attempts: self.config.backoff.max_retries,
            detail: last_err.map_or_else(|| "unknown".to_string(), |e| e.to_string()),
        })
    }

    async fn try_get(
        &self,
        private: bool,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<Value> {
        let base = if private {
            &self.config.private_url
        } else {
            &self.config.public_url
        };
        let url = format!("{base}{path}");

        let mut request = self.client.get(&url).query(query);
        if private {
            let timestamp = Utc::now().timestamp_millis().to_string();
            let sign = self.credentials.sign(&timestamp, "GET", path, "");
            request = request
                .header("API-KEY", self.credentials.api_key())
                .header("API-TIMESTAMP", timestamp)
                .header("API-SIGN", sign);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Http(format!("GET {path}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Http(format!("GET {path}: body read failed: {e}")))?;

        parse_read_envelope(status, &body)
    }

    // ------------------------------------------------------------------
    // Write path: signed, dispatched at most once, classified three ways.
    // ------------------------------------------------------------------

    async fn post_private(&self, path: &str, body: Value) -> OrderOutcome {
        let body_str = body.to_string();
        let url = format!("{}{path}", self.config.private_url);
        let timestamp = Utc::now().timestamp_millis().to_string();
        let sign = self.credentials.sign(&timestamp, "POST", path, &body_str);

        info!(path, body = %body_str, "Dispatching mutating call");

        let sent = self
            .client
            .post(&url)
            .header("API-KEY", self.credentials.api_key())
            .header("API-TIMESTAMP", timestamp)
            .header("API-SIGN", sign)
            .header("Content-Type", "application/json")
            .body(body_str)
            .send()
            .await;

        // From here on, nothing is a plain error: the exchange may have
        // executed the order whatever our local failure says.
        let response = match sent {
            Ok(r) => r,
            Err(e) => {
                return OrderOutcome::Ambiguous {
                    detail: format!("transport failure on POST {path}: {e}"),
                }
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                return OrderOutcome::Ambiguous {
                    detail: format!("body read failed on POST {path}: {e}"),
                }
            }
        };

        classify_post_response(status, &text)
    }

    async fn post_order(&self, intent: &OrderIntent) -> GatewayResult<OrderOutcome> {
        let body = json!({
            "symbol": intent.pair,
            "side": intent.side.to_string(),
            "executionType": "MARKET",
            "size": intent.size.inner().normalize().to_string(),
        });
        Ok(self.post_private("/v1/order", body).await)
    }

    async fn post_close(&self, intent: &OrderIntent) -> GatewayResult<OrderOutcome> {
        let position_id = intent.position_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidIntent("close intent without position id".to_string())
        })?;
        let body = json!({
            "symbol": intent.pair,
            "side": intent.side.to_string(),
            "executionType": "MARKET",
            "settlePosition": [{
                "positionId": position_id.as_str(),
                "size": intent.size.inner().normalize().to_string(),
            }],
        });
        Ok(self.post_private("/v1/closeOrder", body).await)
    }
}

#[async_trait]
impl ExchangeGateway for ForexRestGateway {
    async fn market_quote(&self, pair: &str) -> GatewayResult<MarketQuote> {
        let data = self
            .get_with_retry(false, "/v1/ticker", &[("symbol", pair)])
            .await?;

        let items = data
            .as_array()
            .ok_or_else(|| GatewayError::InvalidResponse("ticker data is not an array".into()))?;
        let item = items
            .iter()
            .find(|i| i.get("symbol").and_then(Value::as_str) == Some(pair))
            .ok_or_else(|| {
                GatewayError::InvalidResponse(format!("no ticker entry for symbol {pair}"))
            })?;

        let (swap_long, swap_short) = match self.config.swap_overrides.get(pair) {
            Some(o) => (o.long, o.short),
            None => {
                warn!(pair, "No swap override configured; swap points default to zero");
                (Decimal::ZERO, Decimal::ZERO)
            }
        };

        Ok(MarketQuote {
            pair: pair.to_string(),
            bid: Price::new(dec_field(item, "bid")?),
            ask: Price::new(dec_field(item, "ask")?),
            swap_long_per_day: swap_long,
            swap_short_per_day: swap_short,
            timestamp: Utc::now(),
        })
    }

    async fn account_snapshot(&self, pair: &str) -> GatewayResult<AccountSnapshot> {
        let assets = self
            .get_with_retry(true, "/v1/account/assets", &[])
            .await?;

        let equity = dec_field(&assets, "equity")
            .or_else(|_| dec_field(&assets, "netAssets"))?;
        // The exchange reports the maintenance ratio as a percentage.
        let margin_ratio = dec_field(&assets, "marginRatio")
            .map(|r| r / Decimal::from(100))
            .unwrap_or_else(|_| Decimal::from(999));

        let open_positions = self.open_positions(pair).await?;

        Ok(AccountSnapshot {
            snapshot_id: SnapshotId::new(),
            equity: Price::new(equity),
            margin_ratio,
            open_positions,
            timestamp: Utc::now(),
        })
    }

    async fn open_positions(&self, pair: &str) -> GatewayResult<Vec<Position>> {
        let data = self
            .get_with_retry(true, "/v1/openPositions", &[("symbol", pair)])
            .await?;

        let Some(list) = data.get("list").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        list.iter().map(parse_position).collect()
    }

    async fn submit(&self, intent: &OrderIntent) -> GatewayResult<OrderOutcome> {
        // Last-line guard: the two-stage lock is re-derived at dispatch
        // time. Upstream checks can go stale mid-cycle; this one cannot.
        let lock = self.arming.current();
        if !lock.armed() {
            return Err(GatewayError::SafetyBlocked(format!(
                "two-stage lock not armed at dispatch ({lock})"
            )));
        }

        // At-most-once per idempotency key.
        {
            let mut dispatched = self.dispatched.lock();
            if !dispatched.insert(intent.key.as_str().to_string()) {
                return Err(GatewayError::DuplicateKey(intent.key.to_string()));
            }
        }

        match intent.action {
            OrderAction::Open => self.post_order(intent).await,
            OrderAction::Close => self.post_close(intent).await,
        }
    }
}

// ----------------------------------------------------------------------
// Pure response classification, testable without a network.
// ----------------------------------------------------------------------

/// Interpret a read response. 429 and 5xx are retryable; an explicit
/// envelope error is not.
fn parse_read_envelope(http_status: u16, body: &str) -> GatewayResult<Value> {
    match http_status {
        429 => return Err(GatewayError::RateLimited(format!("HTTP 429: {body}"))),
        500..=599 => return Err(GatewayError::Http(format!("HTTP {http_status}: {body}"))),
        s if !(200..300).contains(&s) => {
            return Err(GatewayError::Api {
                code: http_status.to_string(),
                message: body.to_string(),
            })
        }
        _ => {}
    }

    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("bad JSON: {e}")))?;

    match envelope.get("status").and_then(Value::as_i64) {
        Some(0) => envelope
            .get("data")
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse("missing data".to_string())),
        Some(_) => {
            let (code, message) = envelope_error(&envelope);
            Err(GatewayError::Api { code, message })
        }
        None => Err(GatewayError::InvalidResponse(
            "missing status field".to_string(),
        )),
    }
}

/// Classify a mutating-call response three ways. Only an explicit,
/// well-formed rejection becomes `Rejected`; everything undecidable is
/// `Ambiguous`.
fn classify_post_response(http_status: u16, body: &str) -> OrderOutcome {
    match http_status {
        // The exchange throttled the request before processing it.
        429 => {
            return OrderOutcome::Rejected {
                reason: "rate limited (HTTP 429)".to_string(),
            }
        }
        // Server-side failure: the order may or may not have executed.
        500..=599 => {
            return OrderOutcome::Ambiguous {
                detail: format!("HTTP {http_status}: {body}"),
            }
        }
        _ => {}
    }

    let Ok(envelope) = serde_json::from_str::<Value>(body) else {
        return OrderOutcome::Ambiguous {
            detail: format!("unparseable response (HTTP {http_status}): {body}"),
        };
    };

    match envelope.get("status").and_then(Value::as_i64) {
        Some(0) => match envelope.get("data").and_then(extract_order_id) {
            Some(order_id) => OrderOutcome::Confirmed {
                exchange_order_id: order_id,
            },
            None => OrderOutcome::Ambiguous {
                detail: "accepted response without an order id".to_string(),
            },
        },
        Some(_) => {
            let (code, message) = envelope_error(&envelope);
            OrderOutcome::Rejected {
                reason: format!("[{code}] {message}"),
            }
        }
        None => OrderOutcome::Ambiguous {
            detail: format!("response without status field (HTTP {http_status})"),
        },
    }
}

fn envelope_error(envelope: &Value) -> (String, String) {
    let first = envelope
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|m| m.first());
    let code = first
        .and_then(|m| m.get("message_code"))
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();
    let message = first
        .and_then(|m| m.get("message_string"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    (code, message)
}

/// Pull an order id out of the data payload, whichever of the known
/// shapes it arrives in (object, array of objects, bare scalar).
fn extract_order_id(data: &Value) -> Option<String> {
    match data {
        Value::Object(_) => data.get("orderId").map(scalar_to_string),
        Value::Array(items) => items.first().and_then(extract_order_id),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn dec_field(value: &Value, key: &str) -> GatewayResult<Decimal> {
    let field = value
        .get(key)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("missing field: {key}")))?;
    let text = match field {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(GatewayError::InvalidResponse(format!(
                "field {key} has unexpected type: {other}"
            )))
        }
    };
    text.parse()
        .map_err(|e| GatewayError::InvalidResponse(format!("field {key}: {e}")))
}

fn parse_position(item: &Value) -> GatewayResult<Position> {
    let id = item
        .get("positionId")
        .map(scalar_to_string)
        .ok_or_else(|| GatewayError::InvalidResponse("position missing positionId".into()))?;
    let pair = item
        .get("symbol")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("position missing symbol".into()))?
        .to_string();
    let side = match item.get("side").and_then(Value::as_str) {
        Some("BUY") => fxcarry_core::OrderSide::Buy,
        Some("SELL") => fxcarry_core::OrderSide::Sell,
        other => {
            return Err(GatewayError::InvalidResponse(format!(
                "position has unexpected side: {other:?}"
            )))
        }
    };
    let opened_at = item
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc));
    let swap_accrued = dec_field(item, "totalSwap").unwrap_or(Decimal::ZERO);

    Ok(Position {
        id: PositionId::new(id),
        pair,
        side,
        size: Size::new(dec_field(item, "size")?),
        entry_price: Price::new(dec_field(item, "price")?),
        opened_at,
        swap_accrued: Price::new(swap_accrued),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_classify_confirmed_with_order_id() {
        let outcome =
            classify_post_response(200, r#"{"status":0,"data":{"orderId":"X1"}}"#);
        assert_eq!(
            outcome,
            OrderOutcome::Confirmed {
                exchange_order_id: "X1".to_string()
            }
        );
    }

    #[test]
    fn test_classify_confirmed_numeric_order_id() {
        let outcome = classify_post_response(200, r#"{"status":0,"data":{"orderId":12345}}"#);
        assert_eq!(
            outcome,
            OrderOutcome::Confirmed {
                exchange_order_id: "12345".to_string()
            }
        );
    }

    #[test]
    fn test_classify_confirmed_from_settle_list() {
        let outcome =
            classify_post_response(200, r#"{"status":0,"data":[{"orderId":"C9"}]}"#);
        assert!(outcome.is_confirmed());
    }

    #[test]
    fn test_classify_explicit_rejection() {
        let body = r#"{"status":1,"messages":[{"message_code":"ERR-201","message_string":"insufficient margin"}]}"#;
        let outcome = classify_post_response(200, body);
        match outcome {
            OrderOutcome::Rejected { reason } => {
                assert!(reason.contains("ERR-201"));
                assert!(reason.contains("insufficient margin"));
            }
            other => panic!("expected rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_malformed_body_is_ambiguous() {
        let outcome = classify_post_response(200, "<html>gateway error</html>");
        assert!(outcome.is_ambiguous());
    }

    #[test]
    fn test_classify_server_error_is_ambiguous() {
        let outcome = classify_post_response(502, "bad gateway");
        assert!(outcome.is_ambiguous());
    }

    #[test]
    fn test_classify_missing_order_id_is_ambiguous() {
        let outcome = classify_post_response(200, r#"{"status":0,"data":{}}"#);
        assert!(outcome.is_ambiguous());
    }

    #[test]
    fn test_classify_http_429_is_rejected() {
        let outcome = classify_post_response(429, "too many requests");
        assert!(matches!(outcome, OrderOutcome::Rejected { .. }));
    }

    #[test]
    fn test_read_envelope_success() {
        let data = parse_read_envelope(200, r#"{"status":0,"data":{"equity":"100"}}"#).unwrap();
        assert_eq!(data.get("equity").unwrap(), "100");
    }

    #[test]
    fn test_read_envelope_429_is_retryable() {
        let err = parse_read_envelope(429, "slow down").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_read_envelope_api_error_not_retryable() {
        let body = r#"{"status":5,"messages":[{"message_code":"ERR-5","message_string":"maintenance"}]}"#;
        let err = parse_read_envelope(200, body).unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, GatewayError::Api { .. }));
    }

    #[test]
    fn test_dec_field_string_and_number() {
        let v = serde_json::json!({"a": "1.5", "b": 2});
        assert_eq!(dec_field(&v, "a").unwrap(), dec!(1.5));
        assert_eq!(dec_field(&v, "b").unwrap(), dec!(2));
        assert!(dec_field(&v, "missing").is_err());
    }

    #[test]
    fn test_parse_position() {
        let item = serde_json::json!({
            "positionId": 443214,
            "symbol": "USD_JPY",
            "side": "BUY",
            "size": "10000",
            "price": "150.25",
            "totalSwap": "12.5",
            "timestamp": "2025-11-01T10:00:00.000Z"
        });
        let position = parse_position(&item).unwrap();
        assert_eq!(position.id, PositionId::new("443214"));
        assert_eq!(position.size, Size::new(dec!(10000)));
        assert_eq!(position.entry_price, Price::new(dec!(150.25)));
        assert_eq!(position.swap_accrued, Price::new(dec!(12.5)));
    }
}
