use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::core::config;

/// Token-bucket rate limiter for outbound YouTube API calls.
///
/// `acquire` never fails, it only delays. Callers reserve a token under the
/// lock and then sleep outside of it, so waiters are served in arrival order
/// and the lock is never held across the sleep. There is no queue limit.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    /// Tokens added per second
    rate: f64,
    /// Maximum number of stored tokens
    capacity: f64,
}

struct Bucket {
    /// May go negative: outstanding reservations not yet paid back
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a limiter issuing `requests_per_second` permits with bursts of
    /// up to `burst` requests.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tubefetch::core::rate_limiter::RateLimiter;
    ///
    /// # async fn example() {
    /// let limiter = RateLimiter::new(10.0, 1);
    /// limiter.acquire().await;
    /// # }
    /// ```
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let rate = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            requests_per_second
        } else {
            log::warn!(
                "Invalid rate {} req/s, falling back to {}",
                requests_per_second,
                config::search::REQUESTS_PER_SECOND
            );
            config::search::REQUESTS_PER_SECOND
        };
        let capacity = f64::from(burst.max(1));

        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            rate,
            capacity,
        }
    }

    /// Waits until one request may be issued.
    pub async fn acquire(&self) {
        let wait = {
            let mut bucket = self.bucket.lock().await;
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
            bucket.last_refill = now;

            let before = bucket.tokens;
            bucket.tokens -= 1.0;
            if before >= 1.0 {
                None
            } else {
                Some(Duration::from_secs_f64((1.0 - before) / self.rate))
            }
        };

        if let Some(wait) = wait {
            log::debug!("Rate limiter: waiting {:?} for an API permit", wait);
            sleep(wait).await;
        }
    }
}
