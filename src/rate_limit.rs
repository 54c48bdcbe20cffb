use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

use crate::config::{NCBI_DEFAULT_RATE, NCBI_KEYED_RATE};

/// Token bucket shared by every request an `EntrezClient` sends
///
/// NCBI E-utilities allow 3 requests per second without an API key and 10
/// with one. Clones share the same bucket, so concurrent batch workers draw
/// from one budget.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
}

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified rate
    ///
    /// # Arguments
    ///
    /// * `rate` - Maximum requests per second (e.g., 3.0 for NCBI without API key)
    ///
    /// # Example
    ///
    /// ```
    /// use pmc_retrieval::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(3.0);
    /// let limiter_with_key = RateLimiter::new(10.0);
    /// ```
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            NCBI_DEFAULT_RATE
        };
        let capacity = rate.max(1.0); // Ensure minimum capacity
        Self {
            bucket: Arc::new(Mutex::new(TokenBucket {
                tokens: capacity,
                capacity,
                refill_rate: rate,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Create rate limiter for NCBI API without API key (3 requests/second)
    pub fn ncbi_default() -> Self {
        Self::new(NCBI_DEFAULT_RATE)
    }

    /// Create rate limiter for NCBI API with API key (10 requests/second)
    pub fn ncbi_with_key() -> Self {
        Self::new(NCBI_KEYED_RATE)
    }

    /// Acquire a token, sleeping until one is available
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill();

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    debug!(remaining_tokens = %bucket.tokens, "Token acquired");
                    return;
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / bucket.refill_rate)
            };

            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");
            sleep(wait).await;
        }
    }

    /// Check if a token is available without consuming it
    pub async fn check_available(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens >= 1.0
    }

    /// Get current token count (for testing and monitoring)
    pub async fn token_count(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens
    }

    /// Get the configured rate limit (requests per second)
    pub async fn rate(&self) -> f64 {
        let bucket = self.bucket.lock().await;
        bucket.refill_rate
    }
}

impl TokenBucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let new_tokens = elapsed.as_secs_f64() * self.refill_rate;

        self.tokens = (self.tokens + new_tokens).min(self.capacity);
        self.last_refill = now;
    }
}
