//! Token-bucket limiter shared by every upstream call in the process.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::HttpError;

/// Public-tier quota: 200 requests per two hours.
pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    max_tokens: u32,
    refill_interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_PERIOD)
    }
}

impl RateLimiter {
    /// `max_tokens` tokens are admitted per `period`, refilling one at a time.
    pub fn new(max_tokens: u32, period: Duration) -> Self {
        let max_tokens = max_tokens.max(1);
        let refill_interval = (period / max_tokens).max(Duration::from_nanos(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_interval,
        }
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let earned = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if earned == 0 {
            return;
        }
        if bucket.tokens as u128 + earned >= self.max_tokens as u128 {
            bucket.tokens = self.max_tokens;
            bucket.last_refill = now;
        } else {
            bucket.tokens += earned as u32;
            bucket.last_refill += self.refill_interval * earned as u32;
        }
    }

    /// Waits for a token. Returns [`HttpError::Cancelled`] if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), HttpError> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                self.refill(&mut bucket, now);
                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    return Ok(());
                }
                let since = now.saturating_duration_since(bucket.last_refill);
                self.refill_interval.saturating_sub(since)
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting for token");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
