//! Global circuit breaker for overload protection.
//!
//! # States
//! - Closed: normal operation, requests go on to per-client checks
//! - Open: every request fails fast until `reset_at`
//!
//! # State Transitions
//! ```text
//! Closed → Open:   aggregate in-window requests > threshold
//! Open → Closed:   now >= reset_at (no trial request, no external action)
//! ```
//!
//! # Design Decisions
//! - One breaker per process, not per client: rotating fingerprints cannot
//!   get around it
//! - The request that trips the breaker is rejected as well
//! - Not internally synchronized; lives under the traffic guard lock

use std::time::Duration;

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { reset_at: Duration },
}

/// Result of asking the breaker whether traffic may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPoll {
    Closed,
    /// Was open, cooldown has elapsed, now closed again.
    Recovered,
    Open { retry_after: Duration },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    threshold: usize,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: BreakerState::Closed,
            threshold: config.threshold,
            cooldown: config.cooldown(),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, BreakerState::Open { .. })
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Evaluate the breaker before any per-client work, closing it if the
    /// cooldown has elapsed.
    pub fn poll(&mut self, now: Duration) -> BreakerPoll {
        match self.state {
            BreakerState::Closed => BreakerPoll::Closed,
            BreakerState::Open { reset_at } if now >= reset_at => {
                self.state = BreakerState::Closed;
                BreakerPoll::Recovered
            }
            BreakerState::Open { reset_at } => BreakerPoll::Open {
                retry_after: reset_at - now,
            },
        }
    }

    /// Feed the current aggregate count. Returns `true` if this observation
    /// opened the breaker.
    pub fn observe(&mut self, aggregate: usize, now: Duration) -> bool {
        if self.is_open() || aggregate <= self.threshold {
            return false;
        }
        self.state = BreakerState::Open {
            reset_at: now + self.cooldown,
        };
        true
    }
}
