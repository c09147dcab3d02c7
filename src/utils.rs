use std::collections::HashMap;

use crate::models::{TrafficRecord, TrafficSummary};

/// Arithmetic mean of a slice; zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around the given mean; zero for an
/// empty slice.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Mean packet length of a batch; zero for an empty batch.
pub fn mean_length(batch: &[TrafficRecord]) -> f64 {
    let lengths: Vec<f64> = batch.iter().map(|r| r.length as f64).collect();
    mean(&lengths)
}

/// Summarize a traffic batch: total packets, mean length and the top-3
/// sources and destinations by packet count.
pub fn summarize(batch: &[TrafficRecord]) -> TrafficSummary {
    if batch.is_empty() {
        return TrafficSummary::default();
    }

    let mut sources: HashMap<&str, usize> = HashMap::new();
    let mut destinations: HashMap<&str, usize> = HashMap::new();
    for record in batch {
        *sources.entry(record.source.as_str()).or_default() += 1;
        *destinations.entry(record.destination.as_str()).or_default() += 1;
    }

    TrafficSummary {
        total_packets: batch.len(),
        average_length: mean_length(batch),
        top_sources: top_n(sources, 3),
        top_destinations: top_n(destinations, 3),
    }
}

/// Most frequent entries first; ties broken by name so output is stable.
fn top_n(counts: HashMap<&str, usize>, n: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}
