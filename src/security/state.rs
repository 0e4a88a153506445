//! Process-wide security state.
//!
//! One [`SecurityState`] owns the rate windows, the circuit breaker, the CSRF
//! token table and the session table. It is built once at startup and shared
//! through an `Arc` with the middleware and the handlers. Tests build a fresh
//! one each, usually on a [`ManualClock`](crate::security::clock::ManualClock).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;

use crate::config::ShieldConfig;
use crate::observability::metrics;
use crate::security::audit::{
    SecurityLog, TracingSecurityLog, EVENT_CIRCUIT_OPENED, EVENT_RATE_LIMIT_EXCEEDED,
};
use crate::security::clock::{Clock, SystemClock};
use crate::security::csrf::CsrfService;
use crate::security::error::SecurityError;
use crate::security::fingerprint::ClientFingerprint;
use crate::security::guard::{Admission, TrafficGuard};
use crate::security::session::SessionService;

pub struct SecurityState {
    config: ShieldConfig,
    guard: Mutex<TrafficGuard>,
    csrf: Arc<CsrfService>,
    sessions: SessionService,
    audit: Arc<dyn SecurityLog>,
    clock: Arc<dyn Clock>,
}

impl SecurityState {
    /// Production state: wall clock and `tracing` security log.
    pub fn new(config: ShieldConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(TracingSecurityLog))
    }

    pub fn with_parts(
        config: ShieldConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn SecurityLog>,
    ) -> Self {
        let guard = TrafficGuard::new(&config.rate_limit, &config.circuit_breaker);
        let csrf = Arc::new(CsrfService::new(&config.csrf, clock.clone()));
        let sessions = SessionService::new(&config.session, csrf.clone(), clock.clone());

        Self {
            config,
            guard: Mutex::new(guard),
            csrf,
            sessions,
            audit,
            clock,
        }
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn csrf(&self) -> &CsrfService {
        &self.csrf
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn audit(&self) -> &dyn SecurityLog {
        self.audit.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Lock the traffic guard. A panic while holding the lock leaves the
    /// windows consistent enough to keep serving.
    pub fn traffic(&self) -> MutexGuard<'_, TrafficGuard> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run circuit breaker and rate limit checks for one request.
    pub fn admit(&self, fingerprint: &ClientFingerprint, client_ip: &str) -> Result<(), SecurityError> {
        let now = self.clock.now();
        let (admission, tracked) = {
            let mut guard = self.traffic();
            let admission = guard.admit(fingerprint, now);
            (admission, guard.limiter().tracked())
        };
        metrics::record_tracked_clients(tracked);

        // Logging happens outside the critical section.
        match admission {
            Admission::Allowed { recovered } => {
                if recovered {
                    tracing::info!("Circuit breaker closed");
                    metrics::record_circuit_transition("closed");
                }
                Ok(())
            }
            Admission::RateLimited { count, retry_after } => {
                tracing::warn!(client = %fingerprint, count, "Rate limit exceeded");
                metrics::record_rate_limited();
                self.audit.log_event(
                    EVENT_RATE_LIMIT_EXCEEDED,
                    json!({ "fingerprint": fingerprint.as_str(), "count": count }),
                    client_ip,
                );
                Err(SecurityError::RateLimited { retry_after })
            }
            Admission::Overloaded {
                retry_after,
                tripped,
                aggregate,
            } => {
                if tripped {
                    tracing::error!(
                        aggregate,
                        threshold = self.config.circuit_breaker.threshold,
                        cooldown_secs = self.config.circuit_breaker.cooldown_secs,
                        "Circuit breaker opened"
                    );
                    metrics::record_circuit_transition("open");
                    self.audit.log_event(
                        EVENT_CIRCUIT_OPENED,
                        json!({ "aggregate": aggregate, "fingerprint": fingerprint.as_str() }),
                        client_ip,
                    );
                }
                Err(SecurityError::Overloaded { retry_after })
            }
        }
    }

    /// Drop idle sessions and expired CSRF tokens. Returns `(sessions, tokens)` removed.
    pub fn sweep(&self) -> (usize, usize) {
        let sessions = self.sessions.sweep(self.sessions.idle_timeout());
        let tokens = self.csrf.purge_expired();
        metrics::record_sweep(sessions, tokens);
        (sessions, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::audit::MemorySecurityLog;
    use crate::security::clock::ManualClock;
    use std::time::Duration;

    fn state(config: ShieldConfig) -> (SecurityState, Arc<ManualClock>, Arc<MemorySecurityLog>) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000)));
        let log = Arc::new(MemorySecurityLog::new());
        (
            SecurityState::with_parts(config, clock.clone(), log.clone()),
            clock,
            log,
        )
    }

    #[test]
    fn test_rate_limit_is_logged_as_security_event() {
        let mut config = ShieldConfig::default();
        config.rate_limit.max_requests = 1;
        let (state, _, log) = state(config);
        let fp = ClientFingerprint::new("f1");

        assert!(state.admit(&fp, "10.0.0.1").is_ok());
        assert!(matches!(
            state.admit(&fp, "10.0.0.1"),
            Err(SecurityError::RateLimited { .. })
        ));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_RATE_LIMIT_EXCEEDED);
        assert_eq!(events[0].client_ip, "10.0.0.1");
        assert_eq!(events[0].details["count"], 1);
    }

    #[test]
    fn test_breaker_logged_only_on_transition() {
        let mut config = ShieldConfig::default();
        config.circuit_breaker.threshold = 2;
        let (state, _, log) = state(config);

        for i in 0..2 {
            assert!(state.admit(&ClientFingerprint::new(format!("c{i}")), "ip").is_ok());
        }
        for i in 2..10 {
            assert!(matches!(
                state.admit(&ClientFingerprint::new(format!("c{i}")), "ip"),
                Err(SecurityError::Overloaded { .. })
            ));
        }
        assert_eq!(log.count(EVENT_CIRCUIT_OPENED), 1);
    }

    #[test]
    fn test_sweep_clears_idle_state() {
        let (state, clock, _) = state(ShieldConfig::default());
        let fp = ClientFingerprint::new("f1");
        state.sessions().create(&fp);
        state.csrf().issue(&fp);

        clock.advance(Duration::from_secs(3601));
        // Session: 1, its CSRF token + the standalone token: 2
        assert_eq!(state.sweep(), (1, 2));
        assert!(state.sessions().is_empty());
        assert!(state.csrf().is_empty());
    }
}
