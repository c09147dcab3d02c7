//! In-memory store implementation.
//!
//! Backs the binary and the integration-style tests, standing in for the
//! durable store collaborator. All collections live behind `RwLock`s for
//! the lifetime of the process.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::{AlertRule, AnomalyRecord, ThreatRecord, TimeRange, TrafficRecord};
use crate::store::{RuleStore, StoreError, TrafficStore};

/// Process-local store for traffic, anomalies, threats and rules.
#[derive(Default)]
pub struct MemoryStore {
    traffic: RwLock<Vec<TrafficRecord>>,
    anomalies: RwLock<Vec<AnomalyRecord>>,
    threats: RwLock<Vec<ThreatRecord>>,
    rules: RwLock<HashMap<Uuid, AlertRule>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted anomalies.
    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.anomalies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Snapshot of all persisted threats.
    pub fn threats(&self) -> Vec<ThreatRecord> {
        self.threats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl TrafficStore for MemoryStore {
    fn fetch_traffic(&self, range: Option<TimeRange>) -> Result<Vec<TrafficRecord>, StoreError> {
        let traffic = self.traffic.read().unwrap_or_else(|e| e.into_inner());
        Ok(match range {
            Some(range) => traffic
                .iter()
                .filter(|r| r.timestamp >= range.start && r.timestamp <= range.end)
                .cloned()
                .collect(),
            None => traffic.clone(),
        })
    }

    fn persist_traffic(&self, record: TrafficRecord) -> Result<(), StoreError> {
        self.traffic
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    fn persist_anomaly(&self, anomaly: AnomalyRecord) -> Result<(), StoreError> {
        self.anomalies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(anomaly);
        Ok(())
    }

    fn persist_threat(&self, threat: ThreatRecord) -> Result<(), StoreError> {
        self.threats
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(threat);
        Ok(())
    }

    fn delete_traffic_older_than(&self, days: i64) -> Result<u64, StoreError> {
        if days <= 0 {
            return Err(StoreError::InvalidInput(format!(
                "retention days must be positive, got {}",
                days
            )));
        }
        let cutoff = Utc::now() - Duration::days(days);
        let mut traffic = self.traffic.write().unwrap_or_else(|e| e.into_inner());
        let before = traffic.len();
        traffic.retain(|r| r.timestamp >= cutoff);
        Ok((before - traffic.len()) as u64)
    }
}

impl RuleStore for MemoryStore {
    fn persist_rule(&self, rule: AlertRule) -> Result<(), StoreError> {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(rule.id, rule);
        Ok(())
    }

    fn delete_rule(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        match rules.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::RuleNotFound(id)),
        }
    }

    fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        Ok(self
            .rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }
}
