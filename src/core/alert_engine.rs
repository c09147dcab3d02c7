//! User-defined alert rules and their evaluation.
//!
//! Rules live in the rule store; every evaluation pass borrows a fresh
//! snapshot and tests each rule against the batch. Field-equality rules
//! match per record (AND over the listed fields); the named "High
//! Traffic" condition compares the batch mean packet length against the
//! rule threshold and fires at most once per pass. One rule failing to
//! evaluate never stops the others.

use std::sync::Arc;

use chrono::Utc;
use log::{error, warn};
use metrics::counter;
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::models::{AlertConfig, AlertRule, RuleCondition, TrafficRecord, TriggeredAlert};
use crate::notify::Notifier;
use crate::store::{RuleStore, StoreError};
use crate::utils::mean_length;

/// Errors that can occur during rule management and evaluation
#[derive(Error, Debug)]
pub enum AlertEngineError {
    /// The rule store rejected or failed the operation
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The rule itself is unusable
    #[error("invalid rule: {0}")]
    InvalidRule(String),
}

/// Alert rule engine.
pub struct AlertEngine {
    /// Rule persistence
    rules: Arc<dyn RuleStore>,
    /// Channel for triggered-alert notifications
    notifier: Arc<dyn Notifier>,
    /// Admin-action log sink
    audit: Arc<dyn AuditSink>,
    /// Alerting configuration
    config: AlertConfig,
}

impl AlertEngine {
    /// Create a new alert engine.
    pub fn new(
        rules: Arc<dyn RuleStore>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        config: AlertConfig,
    ) -> Self {
        Self {
            rules,
            notifier,
            audit,
            config,
        }
    }

    /// Persist a new rule. `threshold` falls back to the configured
    /// default when absent; non-finite or negative thresholds are
    /// rejected before anything is stored.
    pub fn create_rule(
        &self,
        name: &str,
        condition: RuleCondition,
        action: &str,
        threshold: Option<f64>,
    ) -> Result<AlertRule, AlertEngineError> {
        let threshold = threshold.unwrap_or(self.config.default_threshold);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AlertEngineError::InvalidRule(format!(
                "threshold must be a non-negative number, got {}",
                threshold
            )));
        }

        let rule = AlertRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            condition,
            action: action.to_string(),
            threshold,
        };
        self.rules.persist_rule(rule.clone())?;
        self.audit.audit(
            "alert_engine",
            "rule_created",
            &format!("rule '{}' ({})", rule.name, rule.id),
        );
        Ok(rule)
    }

    /// Snapshot of all persisted rules.
    pub fn get_rules(&self) -> Result<Vec<AlertRule>, AlertEngineError> {
        Ok(self.rules.list_rules()?)
    }

    /// Delete a rule. A missing rule is reported as a structured error,
    /// not a crash.
    pub fn delete_rule(&self, id: Uuid) -> Result<(), AlertEngineError> {
        self.rules.delete_rule(id)?;
        self.audit
            .audit("alert_engine", "rule_deleted", &format!("rule {}", id));
        Ok(())
    }

    /// Evaluate every persisted rule against the batch, returning the
    /// alerts that fired. Rule failures are isolated: a malformed rule is
    /// logged and skipped, and a store outage yields an empty result.
    pub fn evaluate(&self, batch: &[TrafficRecord]) -> Vec<TriggeredAlert> {
        let rules = match self.rules.list_rules() {
            Ok(rules) => rules,
            Err(e) => {
                error!("alert evaluation skipped, rule store unavailable: {}", e);
                return Vec::new();
            }
        };

        // computed once per pass, shared by every High Traffic rule
        let mean_len = mean_length(batch);

        let mut triggered = Vec::new();
        for rule in &rules {
            match self.evaluate_rule(rule, batch, mean_len) {
                Ok(mut alerts) => triggered.append(&mut alerts),
                Err(e) => error!("rule '{}' failed to evaluate: {}", rule.name, e),
            }
        }
        if !triggered.is_empty() {
            counter!("alerts_triggered_total", triggered.len() as u64);
        }
        triggered
    }

    fn evaluate_rule(
        &self,
        rule: &AlertRule,
        batch: &[TrafficRecord],
        mean_len: f64,
    ) -> Result<Vec<TriggeredAlert>, AlertEngineError> {
        match &rule.condition {
            RuleCondition::HighTraffic => {
                if !batch.is_empty() && mean_len > rule.threshold {
                    Ok(vec![self.fire(rule)])
                } else {
                    Ok(Vec::new())
                }
            }
            RuleCondition::FieldMatch(fields) => {
                let mut alerts = Vec::new();
                for record in batch {
                    if record_matches(fields, record)? {
                        alerts.push(self.fire(rule));
                    }
                }
                Ok(alerts)
            }
        }
    }

    /// Emit one triggered alert: notify and write the admin-action log
    /// entry. Notification failures are logged, not propagated.
    fn fire(&self, rule: &AlertRule) -> TriggeredAlert {
        let alert = TriggeredAlert {
            rule_id: rule.id,
            name: rule.name.clone(),
            triggered_at: Utc::now(),
            action: rule.action.clone(),
        };
        if let Err(e) = self.notifier.notify(
            &self.config.admin_email,
            &format!("Alert Triggered: {}", rule.name),
            &format!(
                "The alert '{}' was triggered based on your defined conditions.\nAction: {}",
                rule.name, rule.action
            ),
        ) {
            warn!("failed to notify for alert '{}': {}", rule.name, e);
        }
        self.audit.audit(
            "alert_engine",
            "alert_triggered",
            &format!("rule '{}' fired, action: {}", rule.name, rule.action),
        );
        alert
    }
}

/// AND over the listed fields; fields not listed are ignored. Unknown
/// field names or mistyped expected values make the rule malformed.
fn record_matches(
    fields: &std::collections::BTreeMap<String, serde_json::Value>,
    record: &TrafficRecord,
) -> Result<bool, AlertEngineError> {
    for (field, expected) in fields {
        let matched = match field.as_str() {
            "source" => expected_str(field, expected)? == record.source,
            "destination" => expected_str(field, expected)? == record.destination,
            "protocol" => expected_str(field, expected)?.eq_ignore_ascii_case(&record.protocol),
            "length" => expected_u64(field, expected)? == record.length,
            "destination_port" => expected_u64(field, expected)? == u64::from(record.destination_port),
            _ => {
                return Err(AlertEngineError::InvalidRule(format!(
                    "unknown condition field '{}'",
                    field
                )))
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn expected_str<'a>(
    field: &str,
    value: &'a serde_json::Value,
) -> Result<&'a str, AlertEngineError> {
    value.as_str().ok_or_else(|| {
        AlertEngineError::InvalidRule(format!("field '{}' expects a string value", field))
    })
}

fn expected_u64(field: &str, value: &serde_json::Value) -> Result<u64, AlertEngineError> {
    value.as_u64().ok_or_else(|| {
        AlertEngineError::InvalidRule(format!("field '{}' expects a non-negative number", field))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MockAuditSink;
    use crate::notify::MockNotifier;
    use crate::store::memory::MemoryStore;
    use crate::store::MockRuleStore;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(protocol: &str, length: u64) -> TrafficRecord {
        TrafficRecord {
            source: "192.168.1.10".to_string(),
            destination: "10.0.0.1".to_string(),
            protocol: protocol.to_string(),
            length,
            destination_port: 443,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn engine() -> (AlertEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, _, _| Ok(()));
        let mut audit = MockAuditSink::new();
        audit.expect_audit().returning(|_, _, _| ());
        let engine = AlertEngine::new(
            store.clone(),
            Arc::new(notifier),
            Arc::new(audit),
            AlertConfig::default(),
        );
        (engine, store)
    }

    fn icmp_condition() -> RuleCondition {
        let mut fields = BTreeMap::new();
        fields.insert("protocol".to_string(), serde_json::json!("icmp"));
        RuleCondition::FieldMatch(fields)
    }

    #[test]
    fn rule_lifecycle_create_evaluate_delete() {
        let (engine, _) = engine();
        let batch = vec![record("ICMP", 64), record("TCP", 1400)];

        let rule = engine
            .create_rule("icmp watch", icmp_condition(), "Notify Admin", None)
            .unwrap();
        assert_eq!(engine.get_rules().unwrap().len(), 1);
        assert_eq!(engine.evaluate(&batch).len(), 1);

        engine.delete_rule(rule.id).unwrap();
        assert!(engine.get_rules().unwrap().is_empty());
        assert!(engine.evaluate(&batch).is_empty());
    }

    #[test]
    fn equality_rule_triggers_once_per_matching_record() {
        let (engine, _) = engine();
        let batch = vec![record("icmp", 64), record("ICMP", 84), record("TCP", 64)];

        engine
            .create_rule("icmp watch", icmp_condition(), "Notify Admin", None)
            .unwrap();
        // protocol comparison is case-insensitive, so both ICMP records match
        assert_eq!(engine.evaluate(&batch).len(), 2);
    }

    #[test]
    fn and_semantics_over_listed_fields() {
        let (engine, _) = engine();
        let mut fields = BTreeMap::new();
        fields.insert("protocol".to_string(), serde_json::json!("tcp"));
        fields.insert("length".to_string(), serde_json::json!(64));
        engine
            .create_rule(
                "small tcp",
                RuleCondition::FieldMatch(fields),
                "Notify Admin",
                None,
            )
            .unwrap();

        let batch = vec![record("TCP", 64), record("TCP", 1400), record("ICMP", 64)];
        assert_eq!(engine.evaluate(&batch).len(), 1);
    }

    #[test]
    fn high_traffic_rule_fires_at_most_once_per_pass() {
        let (engine, _) = engine();
        engine
            .create_rule(
                "High Traffic",
                RuleCondition::HighTraffic,
                "Notify Admin",
                Some(1000.0),
            )
            .unwrap();

        let batch: Vec<_> = (0..50).map(|_| record("TCP", 1500)).collect();
        let triggered = engine.evaluate(&batch);
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].name, "High Traffic");

        // mean below the threshold: no trigger
        let quiet: Vec<_> = (0..50).map(|_| record("TCP", 100)).collect();
        assert!(engine.evaluate(&quiet).is_empty());
    }

    #[test]
    fn high_traffic_rule_ignores_empty_batches() {
        let (engine, _) = engine();
        engine
            .create_rule(
                "High Traffic",
                RuleCondition::HighTraffic,
                "Notify Admin",
                Some(0.0),
            )
            .unwrap();
        assert!(engine.evaluate(&[]).is_empty());
    }

    #[test]
    fn malformed_rule_does_not_suppress_others() {
        let (engine, _) = engine();
        let mut bad_fields = BTreeMap::new();
        bad_fields.insert("flags".to_string(), serde_json::json!("SYN"));
        engine
            .create_rule(
                "bad rule",
                RuleCondition::FieldMatch(bad_fields),
                "Notify Admin",
                None,
            )
            .unwrap();
        engine
            .create_rule("icmp watch", icmp_condition(), "Notify Admin", None)
            .unwrap();

        let batch = vec![record("ICMP", 64)];
        let triggered = engine.evaluate(&batch);
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].name, "icmp watch");
    }

    #[test]
    fn invalid_threshold_is_rejected_before_persisting() {
        let (engine, store) = engine();
        let result = engine.create_rule(
            "negative",
            RuleCondition::HighTraffic,
            "Notify Admin",
            Some(-1.0),
        );
        assert!(matches!(result, Err(AlertEngineError::InvalidRule(_))));
        assert!(RuleStore::list_rules(store.as_ref()).unwrap().is_empty());
    }

    #[test]
    fn delete_missing_rule_returns_structured_error() {
        let (engine, _) = engine();
        let result = engine.delete_rule(Uuid::new_v4());
        assert!(matches!(
            result,
            Err(AlertEngineError::Store(StoreError::RuleNotFound(_)))
        ));
    }

    #[test]
    fn store_outage_yields_empty_evaluation() {
        let mut rules = MockRuleStore::new();
        rules
            .expect_list_rules()
            .returning(|| Err(StoreError::Unavailable("store offline".to_string())));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let mut audit = MockAuditSink::new();
        audit.expect_audit().returning(|_, _, _| ());

        let engine = AlertEngine::new(
            Arc::new(rules),
            Arc::new(notifier),
            Arc::new(audit),
            AlertConfig::default(),
        );
        assert!(engine.evaluate(&[record("TCP", 64)]).is_empty());
    }
}
