//! Admission control: circuit breaker plus per-client rate limiting.
//!
//! Both share one critical section per request. The breaker is evaluated
//! strictly before the per-client window, and the aggregate is observed only
//! after the current client's window has been updated.

use std::time::Duration;

use crate::config::{CircuitBreakerConfig, RateLimitConfig};
use crate::resilience::{BreakerPoll, CircuitBreaker};
use crate::security::fingerprint::ClientFingerprint;
use crate::security::rate_limit::{RateDecision, SlidingWindowLimiter};

/// Outcome of admitting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed {
        /// The breaker closed itself while handling this request.
        recovered: bool,
    },
    RateLimited {
        count: usize,
        retry_after: Duration,
    },
    Overloaded {
        retry_after: Duration,
        /// This request pushed the aggregate over the threshold.
        tripped: bool,
        aggregate: usize,
    },
}

#[derive(Debug)]
pub struct TrafficGuard {
    limiter: SlidingWindowLimiter,
    breaker: CircuitBreaker,
}

impl TrafficGuard {
    pub fn new(limits: &RateLimitConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            limiter: SlidingWindowLimiter::new(limits),
            breaker: CircuitBreaker::new(breaker),
        }
    }

    pub fn admit(&mut self, fingerprint: &ClientFingerprint, now: Duration) -> Admission {
        let recovered = match self.breaker.poll(now) {
            BreakerPoll::Open { retry_after } => {
                return Admission::Overloaded {
                    retry_after,
                    tripped: false,
                    aggregate: self.limiter.aggregate_total(),
                };
            }
            BreakerPoll::Recovered => true,
            BreakerPoll::Closed => false,
        };

        if let RateDecision::Limited { count, retry_after } = self.limiter.check(fingerprint, now) {
            return Admission::RateLimited { count, retry_after };
        }

        let aggregate = self.limiter.aggregate_total();
        if self.breaker.observe(aggregate, now) {
            return Admission::Overloaded {
                retry_after: self.breaker.cooldown(),
                tripped: true,
                aggregate,
            };
        }

        Admission::Allowed { recovered }
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}
