//! News digest collaborator.
//!
//! Supplies recent headlines for the oracle payload. Strictly best-effort:
//! a failing news source degrades rationale quality, never the cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One news headline passed to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// News source abstraction.
///
/// Implementations must swallow their own failures and return an empty
/// digest instead of erroring.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsClient: Send + Sync {
    async fn recent(&self, pair: &str, limit: usize) -> Vec<NewsItem>;
}

/// Placeholder news source for offline runs and tests.
pub struct StaticNewsClient;

#[async_trait]
impl NewsClient for StaticNewsClient {
    async fn recent(&self, pair: &str, limit: usize) -> Vec<NewsItem> {
        if limit == 0 {
            return Vec::new();
        }
        vec![NewsItem {
            source: "static".to_string(),
            published_at: Utc::now(),
            title: format!("No live news feed configured for {pair}"),
            body: "Static placeholder headline.".to_string(),
        }]
    }
}
