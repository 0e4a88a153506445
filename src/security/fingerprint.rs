//! Client fingerprinting.
//!
//! A fingerprint is a pseudonymous bucketing key, not an identity. It is the
//! first 16 hex characters of `SHA-256(remote_addr:user_agent[..50]:forwarded_for)`.
//! Two clients that collide share rate-limit and session state.

use std::fmt;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// Characters of the user agent that contribute to the fingerprint.
const USER_AGENT_PREFIX: usize = 50;
/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientFingerprint(String);

impl ClientFingerprint {
    /// Wrap an already computed key. Used by callers that bucket on their own.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint for a client. Pure and deterministic.
pub fn fingerprint(remote_addr: &str, user_agent: &str, forwarded_for: &str) -> ClientFingerprint {
    let ua_prefix: String = user_agent.chars().take(USER_AGENT_PREFIX).collect();

    let mut hasher = Sha256::new();
    hasher.update(remote_addr.as_bytes());
    hasher.update(b":");
    hasher.update(ua_prefix.as_bytes());
    hasher.update(b":");
    hasher.update(forwarded_for.as_bytes());
    let digest = hex::encode(hasher.finalize());

    ClientFingerprint(digest[..FINGERPRINT_LEN].to_string())
}

/// Fingerprint a request from its peer address and headers.
pub fn from_headers(remote_addr: &str, headers: &HeaderMap) -> ClientFingerprint {
    fingerprint(
        remote_addr,
        header_str(headers, header::USER_AGENT.as_str()),
        header_str(headers, X_FORWARDED_FOR),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_deterministic_and_truncated() {
        let a = fingerprint("10.0.0.1", "Mozilla/5.0", "");
        let b = fingerprint("10.0.0.1", "Mozilla/5.0", "");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_inputs_change_fingerprint() {
        let base = fingerprint("10.0.0.1", "curl/8.0", "");
        assert_ne!(base, fingerprint("10.0.0.2", "curl/8.0", ""));
        assert_ne!(base, fingerprint("10.0.0.1", "curl/8.1", ""));
        assert_ne!(base, fingerprint("10.0.0.1", "curl/8.0", "203.0.113.9"));
    }

    #[test]
    fn test_user_agent_truncated_to_prefix() {
        let prefix = "a".repeat(50);
        let a = fingerprint("10.0.0.1", &format!("{prefix}first-tail"), "");
        let b = fingerprint("10.0.0.1", &format!("{prefix}second-tail"), "");
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_headers_matches_direct() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("test-agent"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.7"));

        assert_eq!(
            from_headers("127.0.0.1", &headers),
            fingerprint("127.0.0.1", "test-agent", "198.51.100.7")
        );
        assert_eq!(
            from_headers("127.0.0.1", &HeaderMap::new()),
            fingerprint("127.0.0.1", "", "")
        );
    }
}
