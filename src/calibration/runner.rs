use serde::{Deserialize, Serialize};

use crate::reach::{ReachModel, ReachModelConfig};

/// One observed repost outcome: how far a post from an account of this size actually reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    #[serde(default)]
    pub label: Option<String>,
    pub followers: u64,
    pub actual_reach: u64,
}

impl CalibrationSample {
    pub fn new(followers: u64, actual_reach: u64) -> Self {
        Self {
            label: None,
            followers,
            actual_reach,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.followers >= 1 && self.actual_reach >= 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalibrationMetrics {
    pub log_correlation: f64,
    pub median_abs_log_error: f64,
    pub band_coverage: f64,
    pub extrapolated_share: f64,
    pub sample_count: usize,
}

pub struct CalibrationRunner {
    pub samples: Vec<CalibrationSample>,
}

impl CalibrationRunner {
    pub fn new(samples: Vec<CalibrationSample>) -> Self {
        Self { samples }
    }

    pub fn compute_metrics(&self, config: &ReachModelConfig) -> CalibrationMetrics {
        let model = ReachModel::new(config.clone());

        let mut log_pairs = Vec::new();
        let mut abs_errors = Vec::new();
        let mut covered = 0usize;
        let mut extrapolated = 0usize;

        for sample in self.samples.iter().filter(|sample| sample.is_usable()) {
            let Some(estimate) = model.estimate(sample.followers as f64, None, 0) else {
                continue;
            };
            let clamped = estimate.followers as f64;
            let median = model.base_reach(clamped);
            let actual = sample.actual_reach as f64;

            let predicted_log = median.log10();
            let actual_log = actual.log10();
            log_pairs.push((predicted_log, actual_log));
            abs_errors.push((predicted_log - actual_log).abs());

            let low = median * model.low_multiplier();
            let high = median * model.high_multiplier();
            if actual >= low && actual <= high {
                covered += 1;
            }
            if estimate.extrapolated {
                extrapolated += 1;
            }
        }

        let count = log_pairs.len();
        if count == 0 {
            return CalibrationMetrics::default();
        }

        CalibrationMetrics {
            log_correlation: correlation(&log_pairs),
            median_abs_log_error: percentile(&abs_errors, 0.5),
            band_coverage: covered as f64 / count as f64,
            extrapolated_share: extrapolated as f64 / count as f64,
            sample_count: count,
        }
    }
}

pub(crate) fn correlation(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.iter().cloned().unzip();
    let mean_x = mean(&xs);
    let mean_y = mean(&ys);

    let mut numerator = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;

    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        numerator += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }

    if denom_x <= 0.0 || denom_y <= 0.0 {
        return 0.0;
    }

    numerator / (denom_x.sqrt() * denom_y.sqrt())
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&values, 1.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&values, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn perfect_samples_are_fully_covered() {
        let config = ReachModelConfig::default();
        let model = ReachModel::new(config.clone());
        let samples: Vec<CalibrationSample> = [500u64, 5_000, 40_000, 400_000]
            .iter()
            .map(|&followers| {
                let reach = model.base_reach(followers as f64).round() as u64;
                CalibrationSample::new(followers, reach)
            })
            .collect();

        let metrics = CalibrationRunner::new(samples).compute_metrics(&config);

        assert_eq!(metrics.sample_count, 4);
        assert!((metrics.band_coverage - 1.0).abs() < 1e-9);
        assert!(metrics.log_correlation > 0.999);
        assert!(metrics.median_abs_log_error < 1e-4);
        assert!((metrics.extrapolated_share - 0.25).abs() < 1e-9);
    }

    #[test]
    fn unusable_samples_are_ignored() {
        let samples = vec![CalibrationSample::new(0, 100), CalibrationSample::new(100, 0)];
        let metrics = CalibrationRunner::new(samples).compute_metrics(&ReachModelConfig::default());
        assert_eq!(metrics.sample_count, 0);
        assert_eq!(metrics.band_coverage, 0.0);
    }
}
