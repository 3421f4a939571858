//! Token-bucket rate limiter shared by the DAS and WHOIS clients.
//!
//! State is a fractional token count plus the instant of the last refill;
//! every operation refills first, so long-run throughput stays below
//! `capacity / refill_period` while bursts up to `capacity` pass through.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Non-blocking token bucket.
///
/// Callers that want to wait sleep for [`TokenBucket::time_until_token`]
/// themselves; the bucket never suspends.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Bucket regenerating `capacity` tokens over `refill_period`.
    pub fn new(capacity: u32, refill_period: Duration) -> Self {
        let capacity = capacity.max(1) as f64;
        let rate_per_sec = capacity / refill_period.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            rate_per_sec,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    /// Bucket allowing `rate` queries per second, capacity rounded up from the rate.
    pub fn per_second(rate: f64) -> Self {
        let capacity = rate.ceil().max(1.0);
        Self {
            capacity,
            rate_per_sec: rate,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Try to remove one token. Never blocks.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Expected wait until at least one token is available. Zero when one
    /// could be acquired right now.
    pub fn time_until_token(&self) -> Duration {
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let missing = 1.0 - state.tokens;
        Duration::from_secs_f64(missing / self.rate_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_up_to_capacity_then_denied() {
        let bucket = TokenBucket::new(3, Duration::from_secs(3600));
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn time_until_token_zero_when_available() {
        let bucket = TokenBucket::new(1, Duration::from_secs(60));
        assert_eq!(bucket.time_until_token(), Duration::ZERO);
        assert!(bucket.try_acquire());
        let wait = bucket.time_until_token();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(60));
    }

    #[test]
    fn refill_grants_tokens_over_time() {
        let bucket = TokenBucket::per_second(1000.0);
        for _ in 0..1000 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(10));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn grant_count_stays_under_ceiling() {
        // N granted over window T must satisfy granted <= capacity + rate * T.
        let bucket = TokenBucket::per_second(500.0);
        let start = Instant::now();
        let mut granted = 0u32;
        while start.elapsed() < Duration::from_millis(100) {
            if bucket.try_acquire() {
                granted += 1;
            }
        }
        let elapsed = start.elapsed().as_secs_f64();
        let ceiling = 500.0 + 500.0 * elapsed;
        assert!((granted as f64) <= ceiling + 1.0, "granted {granted} over ceiling {ceiling}");
    }

    #[test]
    fn per_second_rounds_capacity_up() {
        let bucket = TokenBucket::per_second(0.5);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }
}
