//! Configuration management for the traffic analysis pipeline.
//!
//! This module handles loading application configuration from an
//! optional configuration file and environment variables, and validates
//! it before any component is built.

use std::env;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};

use crate::models::Config;

/// Load configuration from an optional file and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(Environment::default().separator("__"))
        .set_default("anomaly.length_threshold", 1500)?
        .set_default("anomaly.z_score_threshold", 1.5)?
        .set_default("anomaly.rate_threshold", 1000.0)?
        .set_default("threat.ddos_packet_threshold", 100)?
        .set_default("threat.port_scan_threshold", 10)?
        .set_default("threat.suspicious_ranges", Vec::<String>::new())?
        .set_default("rate_limit.max_requests", 100)?
        .set_default("rate_limit.window_seconds", 60)?
        .set_default("throttle.max_requests", 10)?
        .set_default("throttle.slowdown_seconds", 5)?
        .set_default("alerts.default_threshold", 1000.0)?
        .set_default("alerts.admin_email", "admin@example.com")?
        .set_default("scheduler.summary_interval_secs", 86_400)?
        .set_default("scheduler.log_rotation_interval_secs", 3_600)?
        .set_default("scheduler.cleanup_interval_secs", 604_800)?
        .set_default("scheduler.alert_interval_secs", 900)?
        .set_default("scheduler.health_interval_secs", 600)?
        .set_default("scheduler.retention_days", 30)?
        .build()?;

    let config: Config = config.try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations that would misbehave at runtime before any
/// component sees them.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.scheduler.retention_days <= 0 {
        return Err(ConfigError::Message(format!(
            "scheduler.retention_days must be positive, got {}",
            config.scheduler.retention_days
        )));
    }
    if config.rate_limit.max_requests == 0 || config.rate_limit.window_seconds == 0 {
        return Err(ConfigError::Message(
            "rate_limit.max_requests and rate_limit.window_seconds must be positive".to_string(),
        ));
    }
    if config.anomaly.z_score_threshold <= 0.0 || config.anomaly.rate_threshold <= 0.0 {
        return Err(ConfigError::Message(
            "anomaly thresholds must be positive".to_string(),
        ));
    }
    if config.alerts.default_threshold < 0.0 {
        return Err(ConfigError::Message(format!(
            "alerts.default_threshold must be non-negative, got {}",
            config.alerts.default_threshold
        )));
    }
    let intervals = [
        config.scheduler.summary_interval_secs,
        config.scheduler.log_rotation_interval_secs,
        config.scheduler.cleanup_interval_secs,
        config.scheduler.alert_interval_secs,
        config.scheduler.health_interval_secs,
    ];
    if intervals.iter().any(|&i| i == 0) {
        return Err(ConfigError::Message(
            "scheduler intervals must be positive".to_string(),
        ));
    }
    Ok(())
}
