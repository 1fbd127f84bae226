//! Private-API request signing.
//!
//! The exchange authenticates each private call with an HMAC-SHA256
//! signature over `timestamp + method + path + body`, sent alongside the
//! API key and timestamp headers. This is a pure function of its inputs.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// API credentials. The secret is zeroized on drop and never logged.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ApiCredentials {
    api_key: String,
    api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Sign one request. `timestamp_ms` is the Unix timestamp in
    /// milliseconds as it will appear in the timestamp header.
    #[must_use]
    pub fn sign(&self, timestamp_ms: &str, method: &str, path: &str, body: &str) -> String {
        sign_request(&self.api_secret, timestamp_ms, method, path, body)
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// HMAC-SHA256 over `timestamp + method + path + body`, hex-encoded.
#[must_use]
pub fn sign_request(secret: &str, timestamp_ms: &str, method: &str, path: &str, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp_ms.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_get_request() {
        let sig = sign_request("test-secret", "1700000000000", "GET", "/v1/account/assets", "");
        assert_eq!(
            sig,
            "983ff1a7fcefd50ecaf3a6efcd6a6bb2856ffb0c1f261c3d97a4e88923c3e1da"
        );
    }

    #[test]
    fn test_sign_post_request_includes_body() {
        let sig = sign_request(
            "test-secret",
            "1700000000000",
            "POST",
            "/v1/order",
            "{\"symbol\":\"USD_JPY\"}",
        );
        assert_eq!(
            sig,
            "8f56ba0a6e1c4d16d2d66082badb8f8743d8eca5a7190f24dda0d2a7c9058f7f"
        );
    }

    #[test]
    fn test_different_secrets_differ() {
        let a = sign_request("secret-a", "1700000000000", "GET", "/v1/ticker", "");
        let b = sign_request("secret-b", "1700000000000", "GET", "/v1/ticker", "");
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ApiCredentials::new("key-id", "super-secret");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("key-id"));
    }
}
