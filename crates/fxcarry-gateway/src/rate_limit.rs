//! Rate limiting and backoff for idempotent read calls.
//!
//! Token-bucket limiter shared by every read path (the monitoring reads
//! and the main cycle use a single instance). Mutating calls never touch
//! this module: they are dispatched once, unthrottled and unretried.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::warn;

/// Token bucket state.
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter.
///
/// Capacity and refill rate should match the exchange's published limit.
/// Safe for concurrent use; one instance is shared process-wide.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter with `capacity` burst tokens refilled at
    /// `refill_per_sec` tokens per second. The bucket starts full.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Tokens currently available (after refill).
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;
    }
}

/// Bounded exponential backoff for failed reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Base delay in milliseconds.
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    /// Delay ceiling in milliseconds.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Retry budget. Exhausting it surfaces `NetworkTimeout`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    8_000
}

fn default_max_retries() -> u32 {
    5
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl BackoffConfig {
    /// Delay before retry `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)` plus jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = self.base_ms.saturating_mul(1u64 << exponent).min(self.max_ms);

        if attempt >= self.max_retries {
            warn!(attempt, "Read retry budget nearly exhausted");
        }

        Duration::from_millis(delay + rand_jitter())
    }
}

/// Random jitter (0-250ms) so concurrent readers do not retry in lockstep.
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 250)
}
