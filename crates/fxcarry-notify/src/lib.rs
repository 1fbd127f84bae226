//! Best-effort notifications.
//!
//! Fire-and-forget Discord webhook messages on major transitions (armed,
//! kill switch, halted, opened, closed). Delivery runs on a spawned task
//! and failures are logged and dropped: notification problems must never
//! block or fail the state machine.

use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};

/// Notification severity, mapped to embed color and title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Critical,
}

impl NotifyLevel {
    fn color(self) -> u32 {
        match self {
            Self::Info => 3_066_993,      // green
            Self::Warning => 16_776_960,  // yellow
            Self::Critical => 15_158_332, // red
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Webhook notifier. Constructed once and shared.
#[derive(Clone)]
pub struct Notifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    /// `webhook_url = None` disables delivery; messages are still logged.
    pub fn new(webhook_url: Option<String>) -> Self {
        if webhook_url.is_none() {
            info!("No webhook configured; notifications are log-only");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            webhook_url,
            client,
        }
    }

    /// Send a notification. Returns immediately; delivery is detached.
    pub fn send(&self, message: impl Into<String>, level: NotifyLevel) {
        let message = message.into();
        match level {
            NotifyLevel::Critical => error!(notification = %message, "NOTIFICATION"),
            NotifyLevel::Warning => warn!(notification = %message, "NOTIFICATION"),
            NotifyLevel::Info => info!(notification = %message, "NOTIFICATION"),
        }

        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let payload = build_payload(&message, level);

        tokio::spawn(async move {
            if let Err(e) = client.post(&url).json(&payload).send().await {
                warn!(error = %e, "Webhook delivery failed (dropped)");
            }
        });
    }
}

fn build_payload(message: &str, level: NotifyLevel) -> serde_json::Value {
    json!({
        "username": "fxcarry",
        "embeds": [{
            "title": level.title(),
            "description": message,
            "color": level.color(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = build_payload("position opened", NotifyLevel::Info);
        assert_eq!(payload["username"], "fxcarry");
        assert_eq!(payload["embeds"][0]["description"], "position opened");
        assert_eq!(payload["embeds"][0]["color"], 3_066_993);
    }

    #[test]
    fn test_critical_color() {
        let payload = build_payload("halted", NotifyLevel::Critical);
        assert_eq!(payload["embeds"][0]["title"], "CRITICAL");
        assert_eq!(payload["embeds"][0]["color"], 15_158_332);
    }

    #[tokio::test]
    async fn test_send_without_webhook_does_not_panic() {
        let notifier = Notifier::new(None);
        notifier.send("test", NotifyLevel::Info);
    }
}
