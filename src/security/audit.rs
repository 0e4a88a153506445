//! Security event logging.
//!
//! The pipeline reports rate-limit rejections and CSRF failures to a
//! [`SecurityLog`]. Logging is best effort: a sink cannot fail a request.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

pub const EVENT_RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
pub const EVENT_CSRF_VALIDATION_FAILED: &str = "csrf_validation_failed";
pub const EVENT_CIRCUIT_OPENED: &str = "circuit_breaker_opened";

pub trait SecurityLog: Send + Sync {
    /// Record an event. `details` is expected to be a JSON object.
    fn log_event(&self, event_type: &str, details: Value, client_ip: &str);
}

/// Writes events as structured `tracing` records under the `security` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSecurityLog;

impl SecurityLog for TracingSecurityLog {
    fn log_event(&self, event_type: &str, details: Value, client_ip: &str) {
        tracing::warn!(
            target: "security",
            event_type,
            client_ip,
            details = %details,
            "Security event"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityEventRecord {
    pub event_type: String,
    pub details: Value,
    pub client_ip: String,
}

/// Keeps events in memory, most recent last.
#[derive(Debug, Default)]
pub struct MemorySecurityLog {
    events: Mutex<Vec<SecurityEventRecord>>,
}

impl MemorySecurityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEventRecord> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl SecurityLog for MemorySecurityLog {
    fn log_event(&self, event_type: &str, details: Value, client_ip: &str) {
        let record = SecurityEventRecord {
            event_type: event_type.to_string(),
            details,
            client_ip: client_ip.to_string(),
        };
        // A poisoned log is still a usable log
        match self.events.lock() {
            Ok(mut events) => events.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
