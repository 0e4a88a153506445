//! Server-side sessions with sliding idle expiry.
//!
//! Each session is bound to the fingerprint that created it and carries its
//! own CSRF token. A successful validation refreshes the idle clock and
//! replaces the session's CSRF token once it has been used or has expired;
//! an expired session is deleted the moment someone tries to use it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::RngCore;

use crate::config::SessionConfig;
use crate::security::clock::Clock;
use crate::security::csrf::{CsrfService, CsrfToken};
use crate::security::fingerprint::ClientFingerprint;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub owner: ClientFingerprint,
    pub created_at: Duration,
    pub last_activity_at: Duration,
    pub csrf_token: CsrfToken,
}

/// Why a session check failed. Callers answering HTTP requests should not
/// surface the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    Valid,
    Unknown,
    Expired,
    OwnerMismatch,
}

pub struct SessionService {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
    csrf: Arc<CsrfService>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(config: &SessionConfig, csrf: Arc<CsrfService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout: config.idle_timeout(),
            csrf,
            clock,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Create a session for `owner` and return its identifier.
    pub fn create(&self, owner: &ClientFingerprint) -> String {
        let session_id = generate_session_id();
        let csrf_token = self.csrf.issue(owner);
        let now = self.clock.now();

        self.sessions.insert(
            session_id.clone(),
            Session {
                session_id: session_id.clone(),
                owner: owner.clone(),
                created_at: now,
                last_activity_at: now,
                csrf_token,
            },
        );

        tracing::debug!(client = %owner, "Session created");
        session_id
    }

    pub fn validate(&self, session_id: &str, owner: &ClientFingerprint) -> bool {
        self.check(session_id, owner) == SessionCheck::Valid
    }

    /// Validate a session and report the outcome. Refreshes the idle clock on
    /// success and deletes the record if it has expired.
    ///
    /// A session outlives any single CSRF token, so a consumed or expired
    /// token is swapped for a fresh one bound to the same owner.
    pub fn check(&self, session_id: &str, owner: &ClientFingerprint) -> SessionCheck {
        let now = self.clock.now();

        match self.sessions.entry(session_id.to_owned()) {
            Entry::Vacant(_) => SessionCheck::Unknown,
            Entry::Occupied(mut entry) => {
                if now.saturating_sub(entry.get().last_activity_at) > self.idle_timeout {
                    entry.remove();
                    tracing::debug!("Expired session removed on access");
                    return SessionCheck::Expired;
                }
                if entry.get().owner != *owner {
                    return SessionCheck::OwnerMismatch;
                }
                let session = entry.get_mut();
                session.last_activity_at = now;
                if !self.csrf.is_live(session.csrf_token.as_str()) {
                    session.csrf_token = self.csrf.issue(owner);
                    tracing::debug!(client = %owner, "Session CSRF token rotated");
                }
                SessionCheck::Valid
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|r| r.value().clone())
    }

    /// Remove a session unconditionally. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Remove every session idle for longer than `timeout`.
    pub fn sweep(&self, timeout: Duration) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.saturating_sub(session.last_activity_at) <= timeout);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generate a cryptographically secure random session ID.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CsrfConfig;
    use crate::security::clock::ManualClock;

    fn service() -> (SessionService, Arc<CsrfService>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000_000)));
        let csrf = Arc::new(CsrfService::new(&CsrfConfig::default(), clock.clone()));
        let sessions = SessionService::new(&SessionConfig::default(), csrf.clone(), clock.clone());
        (sessions, csrf, clock)
    }

    fn fp(s: &str) -> ClientFingerprint {
        ClientFingerprint::new(s)
    }

    #[test]
    fn test_create_and_validate() {
        let (sessions, _, _) = service();
        let id = sessions.create(&fp("f1"));
        assert_eq!(id.len(), 64);
        assert!(sessions.validate(&id, &fp("f1")));
        assert!(sessions.validate(&id, &fp("f1")));
    }

    #[test]
    fn test_session_carries_bound_csrf_token() {
        let (sessions, csrf, _) = service();
        let id = sessions.create(&fp("f1"));
        let session = sessions.get(&id).unwrap();
        assert_eq!(session.created_at, session.last_activity_at);
        assert!(!csrf.validate(session.csrf_token.as_str(), &fp("f2")));
        assert!(csrf.validate(session.csrf_token.as_str(), &fp("f1")));
    }

    #[test]
    fn test_consumed_csrf_token_is_replaced() {
        let (sessions, csrf, _) = service();
        let id = sessions.create(&fp("f1"));
        let first = sessions.get(&id).unwrap().csrf_token;

        // Unused token is kept across validations
        assert!(sessions.validate(&id, &fp("f1")));
        assert_eq!(sessions.get(&id).unwrap().csrf_token, first);

        assert!(csrf.validate(first.as_str(), &fp("f1")));
        assert!(sessions.validate(&id, &fp("f1")));

        let second = sessions.get(&id).unwrap().csrf_token;
        assert_ne!(second, first);
        assert!(!csrf.validate(second.as_str(), &fp("f2")));
        assert!(csrf.validate(second.as_str(), &fp("f1")));
    }

    #[test]
    fn test_expired_csrf_token_is_replaced() {
        let (sessions, csrf, clock) = service();
        let id = sessions.create(&fp("f1"));
        let first = sessions.get(&id).unwrap().csrf_token;

        // Keep the session alive past the token TTL
        for _ in 0..4 {
            clock.advance(Duration::from_secs(1000));
            assert!(sessions.validate(&id, &fp("f1")));
        }

        let current = sessions.get(&id).unwrap().csrf_token;
        assert_ne!(current, first);
        assert!(csrf.validate(current.as_str(), &fp("f1")));
    }

    #[test]
    fn test_concurrent_validation_of_expired_session() {
        let (sessions, _, clock) = service();
        let id = sessions.create(&fp("f1"));
        clock.advance(Duration::from_secs(1801));

        let outcomes: Vec<SessionCheck> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| sessions.check(&id, &fp("f1"))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let expired = outcomes.iter().filter(|o| **o == SessionCheck::Expired).count();
        let unknown = outcomes.iter().filter(|o| **o == SessionCheck::Unknown).count();
        assert_eq!(expired, 1);
        assert_eq!(unknown, 15);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_concurrent_validation_keeps_one_live_token() {
        let (sessions, csrf, _) = service();
        let id = sessions.create(&fp("f1"));
        let first = sessions.get(&id).unwrap().csrf_token;
        assert!(csrf.validate(first.as_str(), &fp("f1")));

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| assert!(sessions.validate(&id, &fp("f1"))));
            }
        });

        // Rotation happened once, under the entry lock
        let current = sessions.get(&id).unwrap().csrf_token;
        assert_ne!(current, first);
        assert!(csrf.is_live(current.as_str()));
        assert_eq!(csrf.len(), 2);
    }

    #[test]
    fn test_other_client_rejected_regardless_of_timing() {
        let (sessions, _, clock) = service();
        let id = sessions.create(&fp("f1"));
        assert_eq!(sessions.check(&id, &fp("f2")), SessionCheck::OwnerMismatch);
        clock.advance(Duration::from_secs(10));
        assert!(!sessions.validate(&id, &fp("f2")));
        // Still alive for the owner
        assert!(sessions.validate(&id, &fp("f1")));
    }

    #[test]
    fn test_idle_expiry_removes_session() {
        let (sessions, _, clock) = service();
        let id = sessions.create(&fp("f1"));
        clock.advance(Duration::from_secs(1801));
        assert_eq!(sessions.check(&id, &fp("f1")), SessionCheck::Expired);
        assert_eq!(sessions.check(&id, &fp("f1")), SessionCheck::Unknown);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_validation_slides_expiry() {
        let (sessions, _, clock) = service();
        let id = sessions.create(&fp("f1"));

        clock.advance(Duration::from_secs(1000));
        assert!(sessions.validate(&id, &fp("f1")));

        clock.advance(Duration::from_secs(1799));
        assert!(sessions.validate(&id, &fp("f1")));

        clock.advance(Duration::from_secs(1801));
        assert!(!sessions.validate(&id, &fp("f1")));
    }

    #[test]
    fn test_unknown_and_delete() {
        let (sessions, _, _) = service();
        assert_eq!(sessions.check("nope", &fp("f1")), SessionCheck::Unknown);

        let id = sessions.create(&fp("f1"));
        assert!(sessions.delete(&id));
        assert!(!sessions.delete(&id));
        assert!(!sessions.validate(&id, &fp("f1")));
    }

    #[test]
    fn test_sweep() {
        let (sessions, _, clock) = service();
        let stale = sessions.create(&fp("f1"));
        clock.advance(Duration::from_secs(600));
        let fresh = sessions.create(&fp("f2"));
        clock.advance(Duration::from_secs(300));

        assert_eq!(sessions.sweep(Duration::from_secs(600)), 1);
        assert!(sessions.get(&stale).is_none());
        assert!(sessions.get(&fresh).is_some());
    }
}
