//! Core functionality of the traffic analysis pipeline.
//!
//! This module contains the analysis and control components: anomaly
//! detection, threat detection, the alert engine, admission control and
//! the periodic task scheduler.

pub mod admission;
pub mod alert_engine;
pub mod anomaly_detector;
pub mod scheduler;
pub mod threat_detector;

use serde::{Deserialize, Serialize};

/// Anomaly detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Packet length threshold in bytes
    pub length_threshold: u64,
    /// Z-score magnitude above which a packet length is an outlier
    pub z_score_threshold: f64,
    /// Batch traffic rate threshold in packets per second
    pub rate_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            length_threshold: 1500,
            z_score_threshold: 1.5,
            rate_threshold: 1000.0,
        }
    }
}

/// Threat detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatConfig {
    /// Packets from a single source above which a DDoS is reported
    pub ddos_packet_threshold: u64,
    /// Distinct destination ports above which a port scan is reported
    pub port_scan_threshold: usize,
    /// Source address prefixes treated as suspicious
    #[serde(default)]
    pub suspicious_ranges: Vec<String>,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            ddos_packet_threshold: 100,
            port_scan_threshold: 10,
            suspicious_ranges: Vec::new(),
        }
    }
}

pub use admission::{AdmissionControl, AdmissionError, RateLimiter, Throttle};
pub use alert_engine::{AlertEngine, AlertEngineError};
pub use anomaly_detector::AnomalyDetector;
pub use scheduler::Scheduler;
pub use threat_detector::ThreatDetector;
