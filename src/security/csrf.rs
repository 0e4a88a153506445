//! CSRF token issuance and validation.
//!
//! A token is `"{timestamp}:{nonce}:{signature}"` where the signature is
//! `HMAC-SHA256(secret, "{timestamp}:{nonce}:{fingerprint}")`, hex encoded.
//! Tokens are bound to the fingerprint that obtained them, expire after the
//! TTL, and validate at most once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::config::CsrfConfig;
use crate::security::clock::Clock;
use crate::security::fingerprint::ClientFingerprint;

type HmacSha256 = Hmac<Sha256>;

const NONCE_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;

/// An issued token string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone)]
struct CsrfRecord {
    owner: ClientFingerprint,
    created_at: Duration,
    used: bool,
}

pub struct CsrfService {
    secret: Vec<u8>,
    ttl: Duration,
    tokens: DashMap<String, CsrfRecord>,
    clock: Arc<dyn Clock>,
}

impl CsrfService {
    pub fn new(config: &CsrfConfig, clock: Arc<dyn Clock>) -> Self {
        let secret = match &config.secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                let mut bytes = vec![0u8; SECRET_BYTES];
                rand::rngs::OsRng.fill_bytes(&mut bytes);
                bytes
            }
        };

        Self {
            secret,
            ttl: config.ttl(),
            tokens: DashMap::new(),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token bound to `owner`. Expired tokens are swept first.
    pub fn issue(&self, owner: &ClientFingerprint) -> CsrfToken {
        let now = self.clock.now();
        self.purge_at(now);

        let mut nonce = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let nonce = hex::encode(nonce);
        let timestamp = now.as_secs();

        let signature = hex::encode(self.sign(timestamp, &nonce, owner).finalize().into_bytes());
        let token = format!("{timestamp}:{nonce}:{signature}");

        self.tokens.insert(
            token.clone(),
            CsrfRecord {
                owner: owner.clone(),
                created_at: now,
                used: false,
            },
        );

        CsrfToken(token)
    }

    /// Validate and consume a token presented by `owner`.
    ///
    /// Returns `false` for unknown, malformed, expired, reused, foreign or
    /// badly signed tokens, without saying which.
    pub fn validate(&self, token: &str, owner: &ClientFingerprint) -> bool {
        let mut parts = token.split(':');
        let (Some(timestamp), Some(nonce), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            tracing::debug!("CSRF token malformed");
            return false;
        };
        let (Ok(timestamp), Ok(signature)) = (timestamp.parse::<u64>(), hex::decode(signature))
        else {
            tracing::debug!("CSRF token fields malformed");
            return false;
        };

        let now = self.clock.now();
        let Some(mut record) = self.tokens.get_mut(token) else {
            tracing::debug!("CSRF token unknown");
            return false;
        };

        if now.saturating_sub(record.created_at) > self.ttl {
            drop(record);
            self.tokens.remove(token);
            tracing::debug!("CSRF token expired");
            return false;
        }

        if record.owner != *owner {
            tracing::debug!("CSRF token presented by a different client");
            return false;
        }

        if record.used {
            tracing::debug!("CSRF token already used");
            return false;
        }

        // verify_slice compares in constant time
        if self.sign(timestamp, nonce, owner).verify_slice(&signature).is_err() {
            tracing::debug!("CSRF token signature mismatch");
            return false;
        }

        record.used = true;
        true
    }

    /// Whether `token` could still pass validation: known, unused and within the TTL.
    /// Does not check the owner or signature and does not consume the token.
    pub fn is_live(&self, token: &str) -> bool {
        let now = self.clock.now();
        self.tokens
            .get(token)
            .is_some_and(|record| !record.used && now.saturating_sub(record.created_at) <= self.ttl)
    }

    /// Remove every token older than the TTL. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_at(self.clock.now())
    }

    fn purge_at(&self, now: Duration) -> usize {
        let before = self.tokens.len();
        self.tokens
            .retain(|_, record| now.saturating_sub(record.created_at) <= self.ttl);
        before.saturating_sub(self.tokens.len())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn sign(&self, timestamp: u64, nonce: &str, owner: &ClientFingerprint) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b":");
        mac.update(nonce.as_bytes());
        mac.update(b":");
        mac.update(owner.as_str().as_bytes());
        mac
    }
}
