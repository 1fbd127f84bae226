//! Proposal oracle client.
//!
//! Synchronous request/response from the core's perspective: one bounded-
//! timeout HTTP call per consultation. The model is asked for a strict
//! JSON object; anything that does not parse into the expected shape is an
//! error, which the gate downstream turns into a HOLD.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use fxcarry_core::{MarketQuote, Position, Proposal, SnapshotId};

use crate::error::{OracleError, OracleResult};
use crate::news::NewsItem;

/// Everything the oracle is allowed to see for one consultation.
#[derive(Debug, Clone, Serialize)]
pub struct OraclePayload {
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    pub snapshot_id: SnapshotId,
    pub market: MarketQuote,
    pub positions: Vec<Position>,
    pub news: Vec<NewsItem>,
}

/// The oracle seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProposalOracle: Send + Sync {
    /// Produce a directional proposal for the payload's market.
    ///
    /// Must return within a bounded time; implementations enforce their
    /// own timeout. Callers treat any error as "no proposal".
    async fn propose(&self, payload: &OraclePayload) -> OracleResult<Proposal>;
}

/// Oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard timeout for one consultation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional system-prompt file; `{pair}` is substituted.
    #[serde(default)]
    pub system_prompt_path: Option<String>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            system_prompt_path: None,
        }
    }
}

const FALLBACK_SYSTEM_PROMPT: &str = "You are a professional FX carry trader. \
Analyze the JSON payload for {pair} and respond with a single JSON object: \
{\"action\": \"BUY\"|\"SELL\"|\"HOLD\", \"confidence\": 0.0-1.0, \
\"suggested_leverage\": number, \"rationale\": string}.";

/// What the model is asked to return.
#[derive(Debug, Deserialize)]
struct RawProposal {
    action: String,
    confidence: f64,
    #[serde(default)]
    suggested_leverage: Option<f64>,
    #[serde(default)]
    rationale: String,
}

/// Chat-completions implementation of the oracle.
pub struct OpenAiOracle {
    config: OracleConfig,
    api_key: String,
    client: Client,
    system_prompt: String,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig, api_key: String) -> OracleResult<Self> {
        if api_key.is_empty() {
            return Err(OracleError::MissingApiKey);
        }

        let system_prompt = match &config.system_prompt_path {
            Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
                warn!(path = %path, ?e, "Failed to load system prompt, using fallback");
                FALLBACK_SYSTEM_PROMPT.to_string()
            }),
            None => FALLBACK_SYSTEM_PROMPT.to_string(),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key,
            client,
            system_prompt,
        })
    }

    fn parse_content(content: &str, payload: &OraclePayload) -> OracleResult<Proposal> {
        let raw: RawProposal = serde_json::from_str(content)
            .map_err(|e| OracleError::InvalidResponse(format!("bad proposal JSON: {e}")))?;

        let side = raw
            .action
            .parse()
            .map_err(|e| OracleError::InvalidResponse(format!("{e}")))?;

        let suggested_leverage = raw
            .suggested_leverage
            .and_then(Decimal::from_f64_retain)
            .unwrap_or(Decimal::ONE);

        Ok(Proposal {
            side,
            confidence: raw.confidence,
            suggested_leverage,
            rationale: raw.rationale,
            generated_at: Utc::now(),
            snapshot_id: payload.snapshot_id.clone(),
        })
    }
}

#[async_trait]
impl ProposalOracle for OpenAiOracle {
    async fn propose(&self, payload: &OraclePayload) -> OracleResult<Proposal> {
        let system = self.system_prompt.replace("{pair}", &payload.market.pair);
        let user = serde_json::to_string(payload)
            .map_err(|e| OracleError::InvalidResponse(format!("payload serialization: {e}")))?;

        info!(
            request_id = %payload.request_id,
            model = %self.config.model,
            pair = %payload.market.pair,
            "Consulting proposal oracle"
        );

        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(e.to_string())
                } else {
                    OracleError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Http(format!("HTTP {status}: {text}")));
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("bad response JSON: {e}")))?;

        let content = envelope
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| OracleError::InvalidResponse("missing message content".to_string()))?;

        let proposal = Self::parse_content(content, payload)?;
        info!(
            side = %proposal.side,
            confidence = proposal.confidence,
            "Oracle proposal received"
        );
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxcarry_core::{Price, ProposalSide};
    use rust_decimal_macros::dec;

    fn payload() -> OraclePayload {
        OraclePayload {
            request_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            snapshot_id: SnapshotId::new(),
            market: MarketQuote {
                pair: "MXN_JPY".to_string(),
                bid: Price::new(dec!(8.50)),
                ask: Price::new(dec!(8.52)),
                swap_long_per_day: dec!(18),
                swap_short_per_day: dec!(-21),
                timestamp: Utc::now(),
            },
            positions: vec![],
            news: vec![],
        }
    }

    #[test]
    fn test_parse_content_well_formed() {
        let content = r#"{"action":"BUY","confidence":0.82,"suggested_leverage":2.5,"rationale":"swap differential favourable"}"#;
        let proposal = OpenAiOracle::parse_content(content, &payload()).unwrap();
        assert_eq!(proposal.side, ProposalSide::Buy);
        assert_eq!(proposal.confidence, 0.82);
        assert_eq!(proposal.suggested_leverage, dec!(2.5));
    }

    #[test]
    fn test_parse_content_missing_leverage_defaults_to_one() {
        let content = r#"{"action":"HOLD","confidence":0.4,"rationale":"quiet market"}"#;
        let proposal = OpenAiOracle::parse_content(content, &payload()).unwrap();
        assert_eq!(proposal.suggested_leverage, Decimal::ONE);
    }

    #[test]
    fn test_parse_content_unknown_action_is_error() {
        let content = r#"{"action":"EXIT","confidence":0.9,"rationale":"bail"}"#;
        assert!(OpenAiOracle::parse_content(content, &payload()).is_err());
    }

    #[test]
    fn test_parse_content_non_json_is_error() {
        assert!(OpenAiOracle::parse_content("I think you should buy.", &payload()).is_err());
    }

    #[test]
    fn test_empty_api_key_refused() {
        assert!(matches!(
            OpenAiOracle::new(OracleConfig::default(), String::new()),
            Err(OracleError::MissingApiKey)
        ));
    }
}
