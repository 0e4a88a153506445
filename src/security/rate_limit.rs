//! Sliding-window rate limiting keyed by client fingerprint.
//!
//! # Algorithm
//! Each fingerprint owns the timestamps of its recent requests, oldest first.
//! On every check, timestamps older than the window are dropped. If the
//! remaining count is at the limit the request is rejected without being
//! recorded, otherwise `now` is appended.
//!
//! # Bounded memory
//! When a new fingerprint arrives and `max_entries` are already tracked, the
//! least recently accessed batch (`eviction_fraction` of capacity) is dropped.
//! An evicted client starts over with an empty window.
//!
//! # Aggregate count
//! [`AggregateWindow`] keeps the total number of in-window requests across all
//! fingerprints, updated incrementally so the circuit breaker does not have to
//! re-sum every window on each request.
//!
//! Not internally synchronized: callers hold the [`TrafficGuard`] lock.
//!
//! [`TrafficGuard`]: crate::security::guard::TrafficGuard

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::fingerprint::ClientFingerprint;

/// Outcome of a per-client check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request was recorded.
    Allowed,
    /// The client is at its limit. `count` is the in-window request count,
    /// `retry_after` the time until the oldest of them leaves the window.
    Limited { count: usize, retry_after: Duration },
}

/// Per-fingerprint window.
#[derive(Debug)]
struct RateWindow {
    timestamps: VecDeque<Duration>,
    last_access: u64,
}

/// Multiset of every recorded timestamp, purged by time.
#[derive(Debug, Default)]
pub struct AggregateWindow {
    buckets: BTreeMap<Duration, usize>,
    total: usize,
}

impl AggregateWindow {
    fn record(&mut self, at: Duration) {
        *self.buckets.entry(at).or_insert(0) += 1;
        self.total += 1;
    }

    /// Forget a timestamp that belonged to an evicted client. Timestamps
    /// already purged by time are ignored.
    fn forget(&mut self, at: Duration) {
        if let Some(count) = self.buckets.get_mut(&at) {
            *count -= 1;
            self.total -= 1;
            if *count == 0 {
                self.buckets.remove(&at);
            }
        }
    }

    fn purge(&mut self, now: Duration, window: Duration) {
        // Keep timestamps with `now - ts < window`, i.e. `ts > now - window`.
        let Some(cutoff) = now.checked_sub(window) else {
            return;
        };
        let kept = self.buckets.split_off(&(cutoff + Duration::from_nanos(1)));
        let dropped: usize = self.buckets.values().sum();
        self.total -= dropped;
        self.buckets = kept;
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Sliding-window limiter with LRU-bounded memory.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    windows: HashMap<ClientFingerprint, RateWindow>,
    aggregate: AggregateWindow,
    access_seq: u64,
    window: Duration,
    max_requests: usize,
    max_entries: usize,
    eviction_batch: usize,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: HashMap::new(),
            aggregate: AggregateWindow::default(),
            access_seq: 0,
            window: config.window(),
            max_requests: config.max_requests,
            max_entries: config.max_entries,
            eviction_batch: config.eviction_batch(),
        }
    }

    /// Check and record one request from `fingerprint` at `now`.
    pub fn check(&mut self, fingerprint: &ClientFingerprint, now: Duration) -> RateDecision {
        self.aggregate.purge(now, self.window);

        if !self.windows.contains_key(fingerprint) && self.windows.len() >= self.max_entries {
            self.evict_lru();
        }

        self.access_seq += 1;
        let seq = self.access_seq;
        let window = self.window;

        let entry = self
            .windows
            .entry(fingerprint.clone())
            .or_insert_with(|| RateWindow {
                timestamps: VecDeque::new(),
                last_access: seq,
            });
        entry.last_access = seq;

        while let Some(&oldest) = entry.timestamps.front() {
            if now.saturating_sub(oldest) >= window {
                entry.timestamps.pop_front();
            } else {
                break;
            }
        }

        let count = entry.timestamps.len();
        if count >= self.max_requests {
            let oldest = entry.timestamps.front().copied().unwrap_or(now);
            let retry_after = (oldest + window).saturating_sub(now);
            return RateDecision::Limited { count, retry_after };
        }

        entry.timestamps.push_back(now);
        self.aggregate.record(now);
        RateDecision::Allowed
    }

    /// Drop the least recently accessed batch of fingerprints.
    /// Returns how many were evicted.
    pub fn evict_lru(&mut self) -> usize {
        let mut by_age: Vec<(u64, ClientFingerprint)> = self
            .windows
            .iter()
            .map(|(fp, w)| (w.last_access, fp.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);

        let batch = self.eviction_batch.min(by_age.len());
        for (_, fp) in by_age.into_iter().take(batch) {
            if let Some(evicted) = self.windows.remove(&fp) {
                for ts in evicted.timestamps {
                    self.aggregate.forget(ts);
                }
            }
        }

        metrics::record_evictions(batch);
        tracing::debug!(evicted = batch, remaining = self.windows.len(), "Evicted LRU rate windows");
        batch
    }

    /// Total in-window requests across every tracked fingerprint.
    pub fn aggregate_total(&self) -> usize {
        self.aggregate.total()
    }

    /// Number of distinct fingerprints currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn is_tracked(&self, fingerprint: &ClientFingerprint) -> bool {
        self.windows.contains_key(fingerprint)
    }
}
