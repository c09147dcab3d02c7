//! Audit and threat log seam.
//!
//! Security-relevant events (detections, rule changes, scheduled
//! maintenance) are recorded through this trait. The default
//! implementation emits structured lines on the `audit` log target.

use log::info;

/// Sink for audit and threat log entries.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    /// Record an event on behalf of `actor`.
    fn audit(&self, actor: &str, action: &str, description: &str);
}

/// Audit sink backed by the application log.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn audit(&self, actor: &str, action: &str, description: &str) {
        info!(
            target: "audit",
            "Actor: {} | Event: {} | Description: {}",
            actor, action, description
        );
    }
}
