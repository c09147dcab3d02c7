use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AnomalyConfig, ThreatConfig};

/// Default threshold applied to named alert conditions when the rule does
/// not carry one.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 1000.0;

/// A single captured network traffic record.
///
/// Records are immutable once created. Timestamps within a batch are not
/// guaranteed to be ordered; consumers must tolerate out-of-order arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficRecord {
    /// Source address
    pub source: String,
    /// Destination address
    pub destination: String,
    /// Protocol token (compared case-insensitively)
    pub protocol: String,
    /// Packet length in bytes
    pub length: u64,
    /// Destination port; zero when the capture did not carry one
    #[serde(default)]
    pub destination_port: u16,
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
}

/// Classification assigned by the anomaly detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    #[serde(rename = "High Packet Length")]
    HighPacketLength,
    #[serde(rename = "High Traffic Rate")]
    HighTrafficRate,
}

/// An anomalous traffic record together with the measurement that
/// triggered the classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Classification tag
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// Source address of the offending record
    pub source: String,
    /// Destination address of the offending record
    pub destination: String,
    /// Protocol of the offending record
    pub protocol: String,
    /// Packet length in bytes
    pub length: u64,
    /// The measurement behind the classification: packet length or
    /// z-score for `HighPacketLength`, packets per second for
    /// `HighTrafficRate`
    pub measured: f64,
    /// Timestamp of the offending record
    pub timestamp: DateTime<Utc>,
}

impl AnomalyRecord {
    /// Derive an anomaly record from the traffic record that triggered it.
    pub fn from_record(record: &TrafficRecord, kind: AnomalyKind, measured: f64) -> Self {
        Self {
            kind,
            source: record.source.clone(),
            destination: record.destination.clone(),
            protocol: record.protocol.clone(),
            length: record.length,
            measured,
            timestamp: record.timestamp,
        }
    }
}

/// Threat classification together with its magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ThreatKind {
    #[serde(rename = "DDoS Attack")]
    DdosAttack {
        /// Packets observed from the source within the batch
        packet_count: u64,
    },
    #[serde(rename = "Port Scan")]
    PortScan {
        /// Distinct destination ports touched by the source
        scanned_ports: usize,
    },
    #[serde(rename = "Suspicious IP Range")]
    SuspiciousRange {
        /// First caller-supplied prefix the source address matched
        matched_prefix: String,
    },
}

/// A threat detected within a single batch.
///
/// Threat records carry no history: every detection pass re-derives them
/// from the batch it is handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    /// Classification and magnitude
    #[serde(flatten)]
    pub kind: ThreatKind,
    /// Offending source address
    pub source_ip: String,
    /// Detection timestamp
    pub detected_at: DateTime<Utc>,
}

/// Condition attached to an alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleCondition {
    /// Every listed field must equal the given value (AND semantics);
    /// fields not listed are ignored.
    FieldMatch(BTreeMap<String, serde_json::Value>),
    /// Batch mean packet length compared against the rule threshold.
    HighTraffic,
}

/// User-defined alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule ID
    pub id: Uuid,
    /// Rule name (unique by convention, not enforced)
    pub name: String,
    /// Condition that triggers the rule
    pub condition: RuleCondition,
    /// Free-text directive, e.g. "Notify Admin"
    pub action: String,
    /// Numeric threshold used by named conditions
    pub threshold: f64,
}

/// Alert produced by one evaluation pass. Ephemeral: it only needs to
/// outlive the notification it causes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredAlert {
    /// Rule that fired
    pub rule_id: Uuid,
    /// Human-readable rule name
    pub name: String,
    /// When the rule fired
    pub triggered_at: DateTime<Utc>,
    /// Action string copied from the rule
    pub action: String,
}

/// Summary of a traffic batch, used for the daily report notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSummary {
    /// Total packets in the batch
    pub total_packets: usize,
    /// Mean packet length in bytes
    pub average_length: f64,
    /// Top sources by packet count, most frequent first
    pub top_sources: Vec<(String, usize)>,
    /// Top destinations by packet count, most frequent first
    pub top_destinations: Vec<(String, usize)>,
}

/// Inclusive time range for store queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    /// Range start (inclusive)
    pub start: DateTime<Utc>,
    /// Range end (inclusive)
    pub end: DateTime<Utc>,
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests allowed per window
    pub max_requests: u32,
    /// Time window in seconds
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 60,
        }
    }
}

/// Throttle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Requests allowed before the slowdown kicks in
    pub max_requests: u32,
    /// Delay applied once the count is exceeded, in seconds
    pub slowdown_seconds: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            slowdown_seconds: 5,
        }
    }
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Threshold applied to named conditions when a rule carries none
    pub default_threshold: f64,
    /// Recipient for alert and summary notifications
    pub admin_email: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_ALERT_THRESHOLD,
            admin_email: "admin@example.com".to_string(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Daily summary notification interval in seconds
    pub summary_interval_secs: u64,
    /// Log rotation interval in seconds
    pub log_rotation_interval_secs: u64,
    /// Data retention cleanup interval in seconds
    pub cleanup_interval_secs: u64,
    /// Alert evaluation interval in seconds
    pub alert_interval_secs: u64,
    /// System health snapshot interval in seconds
    pub health_interval_secs: u64,
    /// Traffic older than this many days is deleted by the cleanup task
    pub retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            summary_interval_secs: 86_400,
            log_rotation_interval_secs: 3_600,
            cleanup_interval_secs: 604_800,
            alert_interval_secs: 900,
            health_interval_secs: 600,
            retention_days: 30,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Anomaly detection configuration
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    /// Threat detection configuration
    #[serde(default)]
    pub threat: ThreatConfig,
    /// Rate limit configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Throttle configuration
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Alerting configuration
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}
