//! Anomaly detection over traffic batches.
//!
//! Three modes run over the same batch: a fixed packet-length threshold,
//! a z-score outlier scan over packet lengths, and a batch-wide traffic
//! rate check. Every mode is a pure function of the batch it is handed;
//! no state is retained between calls.

use std::sync::Arc;

use log::error;
use metrics::counter;

use crate::core::AnomalyConfig;
use crate::models::{AnomalyKind, AnomalyRecord, TrafficRecord};
use crate::notify::Notifier;
use crate::store::TrafficStore;
use crate::utils::{mean, population_std_dev};

/// Anomaly detector over traffic batches.
pub struct AnomalyDetector {
    /// Store receiving flagged records
    store: Arc<dyn TrafficStore>,
    /// Channel for rate-detection notifications
    notifier: Arc<dyn Notifier>,
    /// Detection configuration
    config: AnomalyConfig,
    /// Recipient of rate-detection notifications
    admin_email: String,
}

impl AnomalyDetector {
    /// Create a new anomaly detector.
    pub fn new(
        store: Arc<dyn TrafficStore>,
        notifier: Arc<dyn Notifier>,
        config: AnomalyConfig,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            admin_email: admin_email.into(),
        }
    }

    /// Run every detection mode over the batch and return the flagged
    /// records. `z_threshold` overrides the configured z-score threshold
    /// for the outlier scan.
    ///
    /// Empty batches yield an empty result; a record flagged by more than
    /// one mode appears once per mode.
    pub fn detect_anomalies(
        &self,
        batch: &[TrafficRecord],
        z_threshold: Option<f64>,
    ) -> Vec<AnomalyRecord> {
        let mut anomalies = self.detect_long_packets(batch);
        anomalies.extend(self.detect_outliers(batch, z_threshold));
        anomalies.extend(self.detect_high_rate(batch));
        anomalies
    }

    /// Flag every record whose length exceeds the configured threshold.
    pub fn detect_long_packets(&self, batch: &[TrafficRecord]) -> Vec<AnomalyRecord> {
        let mut anomalies = Vec::new();
        for record in batch {
            if record.length > self.config.length_threshold {
                let anomaly = AnomalyRecord::from_record(
                    record,
                    AnomalyKind::HighPacketLength,
                    record.length as f64,
                );
                self.persist(&anomaly);
                anomalies.push(anomaly);
            }
        }
        if !anomalies.is_empty() {
            counter!("anomalies_detected_total", anomalies.len() as u64, "mode" => "length");
        }
        anomalies
    }

    /// Flag records whose packet length deviates from the batch mean by
    /// more than `threshold` population standard deviations.
    ///
    /// A batch with zero standard deviation (all lengths identical) flags
    /// nothing.
    pub fn detect_outliers(
        &self,
        batch: &[TrafficRecord],
        threshold: Option<f64>,
    ) -> Vec<AnomalyRecord> {
        let threshold = threshold.unwrap_or(self.config.z_score_threshold);
        let lengths: Vec<f64> = batch.iter().map(|r| r.length as f64).collect();
        let mean = mean(&lengths);
        let std_dev = population_std_dev(&lengths, mean);
        if std_dev == 0.0 {
            return Vec::new();
        }

        let mut anomalies = Vec::new();
        for record in batch {
            let z = (record.length as f64 - mean) / std_dev;
            if z.abs() > threshold {
                let anomaly =
                    AnomalyRecord::from_record(record, AnomalyKind::HighPacketLength, z);
                self.persist(&anomaly);
                anomalies.push(anomaly);
            }
        }
        if !anomalies.is_empty() {
            counter!("anomalies_detected_total", anomalies.len() as u64, "mode" => "zscore");
        }
        anomalies
    }

    /// Flag the whole batch when its packet rate exceeds the configured
    /// threshold, notifying the admin exactly once per detection.
    ///
    /// Batches with fewer than two records, or whose timestamps all
    /// coincide, carry no measurable rate and are skipped.
    pub fn detect_high_rate(&self, batch: &[TrafficRecord]) -> Vec<AnomalyRecord> {
        if batch.len() < 2 {
            return Vec::new();
        }
        // min/max scan rather than first/last: batches may arrive out of order
        let timestamps = batch.iter().map(|r| r.timestamp);
        let (Some(min_ts), Some(max_ts)) = (timestamps.clone().min(), timestamps.max()) else {
            return Vec::new();
        };
        let span = (max_ts - min_ts).num_milliseconds() as f64 / 1000.0;
        if span <= 0.0 {
            return Vec::new();
        }

        let rate = batch.len() as f64 / span;
        if rate <= self.config.rate_threshold {
            return Vec::new();
        }

        let mut anomalies = Vec::with_capacity(batch.len());
        for record in batch {
            let anomaly = AnomalyRecord::from_record(record, AnomalyKind::HighTrafficRate, rate);
            self.persist(&anomaly);
            anomalies.push(anomaly);
        }
        counter!("anomalies_detected_total", anomalies.len() as u64, "mode" => "rate");

        // one notification per detection call, not one per record
        if let Err(e) = self.notifier.notify(
            &self.admin_email,
            "High Traffic Rate Detected",
            &format!("A high traffic rate of {:.1} packets/sec was detected.", rate),
        ) {
            error!("failed to send high traffic rate notification: {}", e);
        }

        anomalies
    }

    fn persist(&self, anomaly: &AnomalyRecord) {
        if let Err(e) = self.store.persist_anomaly(anomaly.clone()) {
            error!("failed to persist anomaly from {}: {}", anomaly.source, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotifier;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn record(length: u64, offset_ms: i64) -> TrafficRecord {
        TrafficRecord {
            source: "192.168.1.10".to_string(),
            destination: "10.0.0.1".to_string(),
            protocol: "TCP".to_string(),
            length,
            destination_port: 443,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::milliseconds(offset_ms),
        }
    }

    fn detector_with(notifier: MockNotifier) -> (AnomalyDetector, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let detector = AnomalyDetector::new(
            store.clone(),
            Arc::new(notifier),
            AnomalyConfig::default(),
            "admin@example.com",
        );
        (detector, store)
    }

    fn quiet_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, _, _| Ok(()));
        notifier
    }

    #[test]
    fn long_packets_use_strict_threshold() {
        let (detector, store) = detector_with(quiet_notifier());
        let batch = vec![record(1500, 0), record(1501, 10), record(60, 20)];

        let anomalies = detector.detect_long_packets(&batch);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].length, 1501);
        assert_eq!(anomalies[0].kind, AnomalyKind::HighPacketLength);
        assert_eq!(store.anomalies().len(), 1);
    }

    #[test]
    fn identical_lengths_yield_no_outliers() {
        let (detector, _) = detector_with(quiet_notifier());
        let batch: Vec<_> = (0..8i64).map(|i| record(700, i * 100)).collect();

        assert!(detector.detect_outliers(&batch, Some(1.5)).is_empty());
    }

    #[test]
    fn outliers_flagged_by_exact_membership() {
        let (detector, _) = detector_with(quiet_notifier());
        let batch: Vec<_> = [500, 600, 700, 1200, 1500]
            .iter()
            .enumerate()
            .map(|(i, &len)| record(len, i as i64 * 100))
            .collect();

        // mean 900, population std ~384.7: only the 1500-byte record has |z| > 1.5
        let anomalies = detector.detect_outliers(&batch, Some(1.5));
        let flagged: Vec<u64> = anomalies.iter().map(|a| a.length).collect();
        assert_eq!(flagged, vec![1500]);
    }

    #[test]
    fn empty_batch_yields_no_anomalies() {
        let (detector, _) = detector_with(quiet_notifier());
        assert!(detector.detect_anomalies(&[], None).is_empty());
    }

    #[test]
    fn high_rate_flags_whole_batch_and_notifies_once() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|to, subject, _| {
                to == "admin@example.com" && subject == "High Traffic Rate Detected"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let (detector, store) = detector_with(notifier);

        // 5 records over 2ms: far above 1000 packets/sec
        let batch: Vec<_> = (0..5i64).map(|i| record(60, i / 2)).collect();
        let anomalies = detector.detect_high_rate(&batch);

        assert_eq!(anomalies.len(), batch.len());
        assert!(anomalies
            .iter()
            .all(|a| a.kind == AnomalyKind::HighTrafficRate));
        assert_eq!(store.anomalies().len(), batch.len());
    }

    #[test]
    fn single_record_batch_skips_rate_detection() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let (detector, _) = detector_with(notifier);

        assert!(detector.detect_high_rate(&[record(60, 0)]).is_empty());
    }

    #[test]
    fn coinciding_timestamps_skip_rate_detection() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let (detector, _) = detector_with(notifier);

        let batch = vec![record(60, 0), record(80, 0), record(90, 0)];
        assert!(detector.detect_high_rate(&batch).is_empty());
    }

    #[test]
    fn rate_detection_tolerates_out_of_order_timestamps() {
        let (detector, _) = detector_with(quiet_notifier());

        // newest record first; span is still 2ms across the batch
        let batch = vec![record(60, 2), record(60, 0), record(60, 1)];
        let anomalies = detector.detect_high_rate(&batch);
        assert_eq!(anomalies.len(), 3);
    }

    #[test]
    fn slow_traffic_is_not_flagged_as_high_rate() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let (detector, _) = detector_with(notifier);

        // 3 records over 30 seconds: 0.1 packets/sec
        let batch = vec![record(60, 0), record(60, 15_000), record(60, 30_000)];
        assert!(detector.detect_high_rate(&batch).is_empty());
    }
}
