use crate::calibration::runner::{mean, percentile, CalibrationSample};
use crate::reach::ReachModelConfig;

const LOW_QUANTILE: f64 = 0.10;
const HIGH_QUANTILE: f64 = 0.90;
const MIN_SAMPLES: usize = 3;

/// Refits the power-law reach model from observed samples.
pub struct ReachModelFitter {
    pub calibration_data: Vec<CalibrationSample>,
}

impl ReachModelFitter {
    pub fn new(calibration_data: Vec<CalibrationSample>) -> Self {
        Self { calibration_data }
    }

    /// Least squares on `log10(reach) = log10(C) + b * log10(followers)` over samples
    /// inside the fit range; residual quantiles become the uncertainty band.
    ///
    /// Returns `None` with fewer than three usable samples or no spread in followers.
    pub fn fit(&self, base: &ReachModelConfig) -> Option<ReachModelConfig> {
        let points: Vec<(f64, f64)> = self
            .calibration_data
            .iter()
            .filter(|sample| sample.is_usable() && sample.followers <= base.fit_ceiling)
            .map(|sample| ((sample.followers as f64).log10(), (sample.actual_reach as f64).log10()))
            .collect();

        if points.len() < MIN_SAMPLES {
            return None;
        }

        let xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
        let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
        let mean_x = mean(&xs);
        let mean_y = mean(&ys);

        let mut covariance = 0.0;
        let mut variance = 0.0;
        for (x, y) in &points {
            covariance += (x - mean_x) * (y - mean_y);
            variance += (x - mean_x) * (x - mean_x);
        }
        if variance <= f64::EPSILON {
            return None;
        }

        let exponent = covariance / variance;
        let intercept = mean_y - exponent * mean_x;
        let residuals: Vec<f64> = points
            .iter()
            .map(|(x, y)| y - (intercept + exponent * x))
            .collect();

        let mut fitted = base.clone();
        fitted.coefficient = 10f64.powf(intercept);
        fitted.exponent = exponent;
        // The median must stay inside the band.
        fitted.low_log_residual = percentile(&residuals, LOW_QUANTILE).min(0.0);
        fitted.high_log_residual = percentile(&residuals, HIGH_QUANTILE).max(0.0);

        tracing::info!(
            samples = points.len(),
            coefficient = fitted.coefficient,
            exponent = fitted.exponent,
            "refit reach model"
        );

        Some(fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power_law(followers: u64, coefficient: f64, exponent: f64, noise: f64) -> CalibrationSample {
        let reach = coefficient * (followers as f64).powf(exponent) * 10f64.powf(noise);
        CalibrationSample::new(followers, reach.round() as u64)
    }

    #[test]
    fn recovers_exact_power_law() {
        let samples: Vec<CalibrationSample> = [100u64, 1_000, 10_000, 100_000]
            .iter()
            .map(|&f| power_law(f, 2_000.0, 0.5, 0.0))
            .collect();

        let fitted = ReachModelFitter::new(samples)
            .fit(&ReachModelConfig::default())
            .unwrap();

        assert!((fitted.exponent - 0.5).abs() < 1e-4);
        assert!((fitted.coefficient - 2_000.0).abs() / 2_000.0 < 1e-3);
        assert!(fitted.low_log_residual <= 0.0);
        assert!(fitted.high_log_residual >= 0.0);
        assert!(fitted.high_log_residual < 1e-4);
    }

    #[test]
    fn residual_band_brackets_noise() {
        let noise = [-0.1, 0.05, 0.12, -0.08, 0.0, 0.1, -0.12, 0.03, 0.07, -0.02];
        let samples: Vec<CalibrationSample> = noise
            .iter()
            .enumerate()
            .map(|(idx, n)| power_law(1_000 * (idx as u64 + 1) * 7, 15_000.0, 0.4, *n))
            .collect();

        let fitted = ReachModelFitter::new(samples)
            .fit(&ReachModelConfig::default())
            .unwrap();

        assert!(fitted.low_log_residual < -0.05);
        assert!(fitted.high_log_residual > 0.05);
        assert!((fitted.exponent - 0.4).abs() < 0.1);
    }

    #[test]
    fn ignores_samples_beyond_fit_ceiling() {
        let mut samples: Vec<CalibrationSample> = [100u64, 1_000, 10_000]
            .iter()
            .map(|&f| power_law(f, 2_000.0, 0.5, 0.0))
            .collect();
        samples.push(CalibrationSample::new(1_000_000, 1));

        let fitted = ReachModelFitter::new(samples)
            .fit(&ReachModelConfig::default())
            .unwrap();

        assert!((fitted.exponent - 0.5).abs() < 1e-3);
    }

    #[test]
    fn needs_enough_distinct_samples() {
        let base = ReachModelConfig::default();
        let too_few = vec![CalibrationSample::new(10, 100), CalibrationSample::new(20, 200)];
        assert!(ReachModelFitter::new(too_few).fit(&base).is_none());

        let flat = vec![
            CalibrationSample::new(10, 100),
            CalibrationSample::new(10, 120),
            CalibrationSample::new(10, 90),
        ];
        assert!(ReachModelFitter::new(flat).fit(&base).is_none());
    }
}
