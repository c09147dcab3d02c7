//! Traffic Sentinel
//!
//! Network traffic anomaly detection, threat monitoring and admission
//! control. Ingested traffic batches are evaluated for statistical
//! anomalies, attack patterns and user-defined alert conditions; a
//! periodic scheduler drives evaluation, retention cleanup and summary
//! reporting, and an admission layer gates how often callers may invoke
//! expensive queries.

pub mod audit;
pub mod config;
pub mod core;
pub mod models;
pub mod notify;
pub mod store;
pub mod utils;

pub use crate::core::{
    AdmissionControl, AlertEngine, AnomalyDetector, RateLimiter, Scheduler, Throttle,
    ThreatDetector,
};
pub use crate::models::Config;
