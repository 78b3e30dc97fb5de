//! Statistics over a finished session's probe results
//!
//! Stats are computed once, after every operation has produced its result.
//! Latency figures cover successful probes only; with no successes they are
//! all zero.

use crate::models::{duration_micros, ProbeResult};
use crate::types::ProbeErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregated outcome of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStats {
    /// Operations the session was asked to run
    pub requested: u64,
    /// Operations actually dispatched
    pub attempted: u64,
    pub succeeded: u64,
    /// Always `requested - succeeded`
    pub loss: u64,
    pub success_percent: f64,

    #[serde(rename = "min_latency_us", with = "duration_micros")]
    pub min: Duration,
    #[serde(rename = "avg_latency_us", with = "duration_micros")]
    pub avg: Duration,
    #[serde(rename = "max_latency_us", with = "duration_micros")]
    pub max: Duration,
    /// Population standard deviation
    #[serde(rename = "std_dev_latency_us", with = "duration_micros")]
    pub std_dev: Duration,

    #[serde(rename = "p50_latency_us", with = "duration_micros")]
    pub p50: Duration,
    #[serde(rename = "p95_latency_us", with = "duration_micros")]
    pub p95: Duration,
    #[serde(rename = "p99_latency_us", with = "duration_micros")]
    pub p99: Duration,

    #[serde(rename = "resolve_time_us", with = "duration_micros")]
    pub resolve_time: Duration,
    #[serde(rename = "total_time_us", with = "duration_micros")]
    pub total_time: Duration,

    /// Failed results per error kind
    pub failures: BTreeMap<ProbeErrorKind, u64>,
}

impl ProbeStats {
    pub fn is_total_loss(&self) -> bool {
        self.succeeded == 0
    }

    pub fn min_ms(&self) -> f64 {
        self.min.as_secs_f64() * 1000.0
    }

    pub fn avg_ms(&self) -> f64 {
        self.avg.as_secs_f64() * 1000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max.as_secs_f64() * 1000.0
    }

    pub fn std_dev_ms(&self) -> f64 {
        self.std_dev.as_secs_f64() * 1000.0
    }
}

/// Reduces results into [`ProbeStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    requested: u64,
    resolve_time: Duration,
    total_time: Duration,
}

impl StatsAggregator {
    pub fn new(requested: u64) -> Self {
        Self {
            requested,
            ..Default::default()
        }
    }

    pub fn with_resolve_time(mut self, resolve_time: Duration) -> Self {
        self.resolve_time = resolve_time;
        self
    }

    /// Wall-clock time from session start to finalize
    pub fn with_total_time(mut self, total_time: Duration) -> Self {
        self.total_time = total_time;
        self
    }

    pub fn aggregate(&self, results: &[ProbeResult]) -> ProbeStats {
        let mut latencies: Vec<u128> = results
            .iter()
            .filter(|r| r.is_successful())
            .map(|r| r.latency.as_nanos())
            .collect();
        latencies.sort_unstable();

        let attempted = results.iter().filter(|r| r.was_dispatched()).count() as u64;
        let succeeded = latencies.len() as u64;

        let mut failures = BTreeMap::new();
        for kind in results.iter().filter_map(ProbeResult::error_kind) {
            *failures.entry(kind).or_insert(0) += 1;
        }

        let success_percent = if self.requested == 0 {
            0.0
        } else {
            succeeded as f64 * 100.0 / self.requested as f64
        };

        let (min, avg, max, std_dev) = match (latencies.first(), latencies.last()) {
            (Some(&min), Some(&max)) => {
                let sum: u128 = latencies.iter().sum();
                let mean = sum / latencies.len() as u128;
                (
                    nanos(min),
                    nanos(mean),
                    nanos(max),
                    Duration::from_secs_f64(population_std_dev(&latencies) / 1e9),
                )
            }
            _ => (Duration::ZERO, Duration::ZERO, Duration::ZERO, Duration::ZERO),
        };

        ProbeStats {
            requested: self.requested,
            attempted,
            succeeded,
            loss: self.requested.saturating_sub(succeeded),
            success_percent,
            min,
            avg,
            max,
            std_dev,
            p50: nanos(calculate_percentile(&latencies, 50.0)),
            p95: nanos(calculate_percentile(&latencies, 95.0)),
            p99: nanos(calculate_percentile(&latencies, 99.0)),
            resolve_time: self.resolve_time,
            total_time: self.total_time,
            failures,
        }
    }
}

fn nanos(value: u128) -> Duration {
    Duration::from_nanos(value.min(u64::MAX as u128) as u64)
}

fn population_std_dev(sorted_nanos: &[u128]) -> f64 {
    if sorted_nanos.len() < 2 {
        return 0.0;
    }

    let count = sorted_nanos.len() as f64;
    let mean = sorted_nanos.iter().map(|&v| v as f64).sum::<f64>() / count;
    let variance = sorted_nanos
        .iter()
        .map(|&v| {
            let diff = v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / count;

    let std_dev = variance.sqrt();
    if std_dev.is_finite() {
        std_dev
    } else {
        0.0
    }
}

/// Linear interpolation between closest ranks
pub fn calculate_percentile(sorted_values: &[u128], percentile: f64) -> u128 {
    if sorted_values.is_empty() {
        return 0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index] as f64;
        let upper_value = sorted_values[upper_index] as f64;
        let weight = index - lower_index as f64;
        (lower_value + weight * (upper_value - lower_value)).round() as u128
    }
}
