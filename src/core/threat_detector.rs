//! Threat detection over traffic batches.
//!
//! Three independent classifiers operate over the same batch: per-source
//! packet counting (DDoS), distinct destination port counting (port
//! scans) and source address prefix matching (suspicious ranges). Each
//! pass re-derives everything from the batch it is handed; no history is
//! kept between calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use log::error;
use metrics::counter;

use crate::audit::AuditSink;
use crate::core::ThreatConfig;
use crate::models::{ThreatKind, ThreatRecord, TrafficRecord};
use crate::store::TrafficStore;

/// Threat detector over traffic batches.
pub struct ThreatDetector {
    /// Store receiving detected threats
    store: Arc<dyn TrafficStore>,
    /// Threat log sink
    audit: Arc<dyn AuditSink>,
    /// Detection configuration
    config: ThreatConfig,
}

impl ThreatDetector {
    /// Create a new threat detector.
    pub fn new(store: Arc<dyn TrafficStore>, audit: Arc<dyn AuditSink>, config: ThreatConfig) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// Report every source whose packet count within the batch exceeds
    /// the threshold (strictly greater than). `threshold` overrides the
    /// configured default.
    pub fn detect_ddos(&self, batch: &[TrafficRecord], threshold: Option<u64>) -> Vec<ThreatRecord> {
        let threshold = threshold.unwrap_or(self.config.ddos_packet_threshold);

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for record in batch {
            *counts.entry(record.source.as_str()).or_default() += 1;
        }

        let mut threats: Vec<ThreatRecord> = counts
            .into_iter()
            .filter(|(_, count)| *count > threshold)
            .map(|(ip, count)| ThreatRecord {
                kind: ThreatKind::DdosAttack {
                    packet_count: count,
                },
                source_ip: ip.to_string(),
                detected_at: Utc::now(),
            })
            .collect();
        threats.sort_by(|a, b| a.source_ip.cmp(&b.source_ip));

        for threat in &threats {
            self.report(
                threat,
                "ddos_detected",
                &format!("potential DDoS attack from {}", threat.source_ip),
            );
        }
        threats
    }

    /// Report every source touching more distinct destination ports than
    /// the threshold (strictly greater than). Records without a port
    /// count toward port zero rather than failing the batch.
    pub fn detect_port_scan(
        &self,
        batch: &[TrafficRecord],
        threshold: Option<usize>,
    ) -> Vec<ThreatRecord> {
        let threshold = threshold.unwrap_or(self.config.port_scan_threshold);

        let mut ports_by_source: HashMap<&str, HashSet<u16>> = HashMap::new();
        for record in batch {
            ports_by_source
                .entry(record.source.as_str())
                .or_default()
                .insert(record.destination_port);
        }

        let mut threats: Vec<ThreatRecord> = ports_by_source
            .into_iter()
            .filter(|(_, ports)| ports.len() > threshold)
            .map(|(ip, ports)| ThreatRecord {
                kind: ThreatKind::PortScan {
                    scanned_ports: ports.len(),
                },
                source_ip: ip.to_string(),
                detected_at: Utc::now(),
            })
            .collect();
        threats.sort_by(|a, b| a.source_ip.cmp(&b.source_ip));

        for threat in &threats {
            self.report(
                threat,
                "port_scan_detected",
                &format!("port scanning activity from {}", threat.source_ip),
            );
        }
        threats
    }

    /// Report every record whose source address starts with one of the
    /// caller-supplied prefixes. When several prefixes match, the record
    /// is reported against the first one in the caller's order.
    pub fn detect_suspicious_ranges(
        &self,
        batch: &[TrafficRecord],
        prefixes: &[String],
    ) -> Vec<ThreatRecord> {
        let mut threats = Vec::new();
        for record in batch {
            let matched = prefixes.iter().find(|p| record.source.starts_with(p.as_str()));
            if let Some(prefix) = matched {
                let threat = ThreatRecord {
                    kind: ThreatKind::SuspiciousRange {
                        matched_prefix: prefix.clone(),
                    },
                    source_ip: record.source.clone(),
                    detected_at: Utc::now(),
                };
                self.report(
                    &threat,
                    "suspicious_range_detected",
                    &format!("traffic from suspicious range {} ({})", prefix, record.source),
                );
                threats.push(threat);
            }
        }
        threats
    }

    /// Run the suspicious-range classifier against the configured prefix
    /// list.
    pub fn detect_configured_ranges(&self, batch: &[TrafficRecord]) -> Vec<ThreatRecord> {
        let prefixes = self.config.suspicious_ranges.clone();
        self.detect_suspicious_ranges(batch, &prefixes)
    }

    fn report(&self, threat: &ThreatRecord, action: &str, description: &str) {
        counter!("threats_detected_total", 1);
        self.audit.audit("threat_detector", action, description);
        if let Err(e) = self.store.persist_threat(threat.clone()) {
            error!("failed to persist threat from {}: {}", threat.source_ip, e);
        }
    }
}
