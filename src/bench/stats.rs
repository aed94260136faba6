/*!
Aggregate statistics over benchmark samples.
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Summary of a set of timings, in microseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchStats {
    pub samples: usize,
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    pub median_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub std_dev_us: f64,
    pub ops_per_sec: f64,
}

fn micros(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000_000.0
}

/// Nearest-rank percentile over sorted values
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl BenchStats {
    /// Summarise `samples`; `None` when there are none
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut values: Vec<f64> = samples.iter().copied().map(micros).collect();
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        Some(Self {
            samples: n,
            min_us: values[0],
            max_us: values[n - 1],
            mean_us: mean,
            median_us: median,
            p95_us: percentile(&values, 95.0),
            p99_us: percentile(&values, 99.0),
            std_dev_us: variance.sqrt(),
            ops_per_sec: if mean > 0.0 { 1_000_000.0 / mean } else { f64::INFINITY },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_micros(*v)).collect()
    }

    #[test]
    fn test_empty() {
        assert!(BenchStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_basic_statistics() {
        let stats = BenchStats::from_samples(&us(&[40, 10, 30, 20])).unwrap();
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.min_us, 10.0);
        assert_eq!(stats.max_us, 40.0);
        assert_eq!(stats.mean_us, 25.0);
        assert_eq!(stats.median_us, 25.0);
        assert_eq!(stats.p95_us, 40.0);
        assert!((stats.std_dev_us - 125.0f64.sqrt()).abs() < 1e-9);
        assert!((stats.ops_per_sec - 40_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_percentiles_over_hundred_samples() {
        let samples: Vec<u64> = (1..=100).collect();
        let stats = BenchStats::from_samples(&us(&samples)).unwrap();
        assert_eq!(stats.median_us, 50.5);
        assert_eq!(stats.p95_us, 95.0);
        assert_eq!(stats.p99_us, 99.0);
    }

    #[test]
    fn test_single_sample() {
        let stats = BenchStats::from_samples(&us(&[7])).unwrap();
        assert_eq!(stats.median_us, 7.0);
        assert_eq!(stats.p99_us, 7.0);
        assert_eq!(stats.std_dev_us, 0.0);
    }
}
