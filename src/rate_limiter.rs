use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{RateDecision, RateGate};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Per-sender token bucket limiter for the webhook
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<RwLock<RateLimiterInner>>,
    requests_per_minute: u32,
    burst_size: u32,
    cleanup_interval: Duration,
    idle_timeout: Duration,
}

#[derive(Debug)]
struct RateLimiterInner {
    senders: HashMap<String, SenderState>,
    last_cleanup: Instant,
}

#[derive(Debug)]
struct SenderState {
    tokens: u32,
    last_refill: Instant,
    last_request: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RateLimiterInner {
                senders: HashMap::new(),
                last_cleanup: Instant::now(),
            })),
            requests_per_minute: requests_per_minute.max(1),
            burst_size,
            cleanup_interval: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(600),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_minute, config.burst_size)
    }

    /// Time it takes to earn one token back.
    fn refill_period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.requests_per_minute as f64)
    }

    /// Consume one token for `sender` if one is available.
    pub async fn check_rate_limit(&self, sender: &str) -> RateDecision {
        let mut limiter = self.inner.write().await;

        let now = Instant::now();
        if now.duration_since(limiter.last_cleanup) > self.cleanup_interval {
            self.cleanup_idle(&mut limiter, now);
            limiter.last_cleanup = now;
        }

        let period = self.refill_period();
        let state = limiter
            .senders
            .entry(sender.to_string())
            .or_insert_with(|| SenderState {
                tokens: self.burst_size,
                last_refill: now,
                last_request: now,
            });

        let earned = (now.duration_since(state.last_refill).as_secs_f64() / period.as_secs_f64())
            .floor() as u32;
        if earned > 0 {
            state.tokens = state.tokens.saturating_add(earned).min(self.burst_size);
            // keep the fractional progress toward the next token
            state.last_refill += period * earned;
            debug!(sender, tokens = state.tokens, "refilled rate limit tokens");
        }
        state.last_request = now;

        if state.tokens > 0 {
            state.tokens -= 1;
            RateDecision::Allowed
        } else {
            let retry_after = (state.last_refill + period).saturating_duration_since(now);
            warn!(sender, ?retry_after, "rate limit exceeded");
            RateDecision::Limited { retry_after }
        }
    }

    /// Number of senders currently tracked.
    pub async fn tracked(&self) -> usize {
        self.inner.read().await.senders.len()
    }

    fn cleanup_idle(&self, limiter: &mut RateLimiterInner, now: Instant) {
        let idle_timeout = self.idle_timeout;
        limiter.senders.retain(|sender, state| {
            let keep = now.duration_since(state.last_request) <= idle_timeout;
            if !keep {
                debug!(sender = %sender, "dropping idle rate limit bucket");
            }
            keep
        });
    }
}

#[async_trait]
impl RateGate for RateLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        self.check_rate_limit(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(decision: RateDecision) -> bool {
        decision == RateDecision::Allowed
    }

    #[tokio::test(start_paused = true)]
    async fn allows_burst_then_limits() {
        let limiter = RateLimiter::new(60, 3);
        for _ in 0..3 {
            assert!(allowed(limiter.check_rate_limit("+1").await));
        }
        match limiter.check_rate_limit("+1").await {
            RateDecision::Limited { retry_after } => {
                assert!(retry_after <= Duration::from_secs(1));
            }
            RateDecision::Allowed => panic!("fourth request should be limited"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refills_over_time() {
        let limiter = RateLimiter::new(60, 2);
        assert!(allowed(limiter.check_rate_limit("+1").await));
        assert!(allowed(limiter.check_rate_limit("+1").await));
        assert!(!allowed(limiter.check_rate_limit("+1").await));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(allowed(limiter.check_rate_limit("+1").await));
        assert!(!allowed(limiter.check_rate_limit("+1").await));

        // half a period was carried over from the previous refill
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(allowed(limiter.check_rate_limit("+1").await));
    }

    #[tokio::test(start_paused = true)]
    async fn senders_have_separate_buckets() {
        let limiter = RateLimiter::new(60, 1);
        assert!(allowed(limiter.check_rate_limit("+1").await));
        assert!(allowed(limiter.check_rate_limit("+2").await));
        assert!(!allowed(limiter.check_rate_limit("+1").await));
        assert_eq!(limiter.tracked().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_senders_are_dropped() {
        let limiter = RateLimiter::new(60, 1);
        limiter.check_rate_limit("+1").await;
        tokio::time::advance(Duration::from_secs(601)).await;
        limiter.check_rate_limit("+2").await;
        assert_eq!(limiter.tracked().await, 1);
    }

    #[tokio::test]
    async fn works_as_rate_gate() {
        let gate: Arc<dyn RateGate> = Arc::new(RateLimiter::new(30, 1));
        assert_eq!(gate.check("+1").await, RateDecision::Allowed);
        assert!(matches!(gate.check("+1").await, RateDecision::Limited { .. }));
    }
}
