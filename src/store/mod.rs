//! Persistence seam for the traffic analysis pipeline.
//!
//! Durable storage of traffic, anomaly, threat and rule records is an
//! external collaborator; the core only depends on the traits below.
//! [`memory`] provides the in-process implementation used by the binary
//! and the test suite.

pub mod memory;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{AlertRule, AnomalyRecord, ThreatRecord, TimeRange, TrafficRecord};

/// Errors surfaced by store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached or is in a bad state
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// No rule exists with the given ID
    #[error("rule not found: {0}")]
    RuleNotFound(Uuid),
    /// The caller passed a value the store rejects outright
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Storage operations for traffic, anomaly and threat records.
#[cfg_attr(test, mockall::automock)]
pub trait TrafficStore: Send + Sync {
    /// Fetch traffic records, optionally restricted to a time range.
    fn fetch_traffic(&self, range: Option<TimeRange>) -> Result<Vec<TrafficRecord>, StoreError>;

    /// Insert a captured traffic record.
    fn persist_traffic(&self, record: TrafficRecord) -> Result<(), StoreError>;

    /// Persist a detected anomaly.
    fn persist_anomaly(&self, anomaly: AnomalyRecord) -> Result<(), StoreError>;

    /// Persist a detected threat.
    fn persist_threat(&self, threat: ThreatRecord) -> Result<(), StoreError>;

    /// Delete traffic older than the given number of days, returning how
    /// many records were removed. Non-positive day counts are rejected
    /// before any record is touched.
    fn delete_traffic_older_than(&self, days: i64) -> Result<u64, StoreError>;
}

/// Storage operations for alert rules.
#[cfg_attr(test, mockall::automock)]
pub trait RuleStore: Send + Sync {
    /// Persist a new rule.
    fn persist_rule(&self, rule: AlertRule) -> Result<(), StoreError>;

    /// Delete a rule by ID. Returns [`StoreError::RuleNotFound`] when no
    /// such rule exists.
    fn delete_rule(&self, id: Uuid) -> Result<(), StoreError>;

    /// Snapshot of all persisted rules.
    fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError>;
}
