//! Power-law reach model.
//!
//! Maps a follower count to a conservative/median/aggressive reach triple.
//! The median follows `coefficient * followers^exponent`; the band comes from
//! fixed log10 residual quantiles of the fit.

use serde::{Deserialize, Serialize};

/// Follower counts above this are treated as this many.
pub const MAX_FOLLOWERS: u64 = 5_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachModelConfig {
    pub coefficient: f64,
    pub exponent: f64,
    pub low_log_residual: f64,
    pub high_log_residual: f64,
    /// Follower counts are clamped here before estimation.
    pub max_followers: u64,
    /// Largest follower count seen when fitting; beyond it estimates extrapolate.
    pub fit_ceiling: u64,
    pub round_to: i64,
    pub network_cap: Option<u64>,
}

impl Default for ReachModelConfig {
    fn default() -> Self {
        Self {
            coefficient: 16830.76,
            exponent: 0.396285,
            low_log_residual: -0.102,
            high_log_residual: 0.123,
            max_followers: MAX_FOLLOWERS,
            fit_ceiling: 250_000,
            round_to: 1000,
            network_cap: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachEstimate {
    pub followers: u64,
    pub conservative: u64,
    pub median: u64,
    pub aggressive: u64,
    pub reach_per_follower: f64,
    pub extrapolated: bool,
}

#[derive(Debug, Clone)]
pub struct ReachModel {
    config: ReachModelConfig,
}

impl Default for ReachModel {
    fn default() -> Self {
        Self::new(ReachModelConfig::default())
    }
}

impl ReachModel {
    pub fn new(config: ReachModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReachModelConfig {
        &self.config
    }

    pub fn low_multiplier(&self) -> f64 {
        10f64.powf(self.config.low_log_residual)
    }

    pub fn high_multiplier(&self) -> f64 {
        10f64.powf(self.config.high_log_residual)
    }

    /// Unrounded, uncapped median reach for an already clamped follower count.
    pub fn base_reach(&self, followers: f64) -> f64 {
        self.config.coefficient * followers.powf(self.config.exponent)
    }

    /// Estimate with the configured network cap and rounding granularity.
    pub fn estimate_default(&self, followers: f64) -> Option<ReachEstimate> {
        self.estimate(followers, self.config.network_cap, self.config.round_to)
    }

    /// Returns `None` for follower counts below one or not finite.
    ///
    /// `round_to <= 0` rounds to the nearest integer. Under a cap, a value whose
    /// nearest multiple would pass the cap is rounded down instead.
    pub fn estimate(
        &self,
        followers: f64,
        cap: Option<u64>,
        round_to: i64,
    ) -> Option<ReachEstimate> {
        if !followers.is_finite() || followers < 1.0 {
            return None;
        }

        let clamped = followers.floor().min(self.config.max_followers as f64);
        let followers = clamped as u64;
        let extrapolated = followers > self.config.fit_ceiling;

        let base = self.base_reach(clamped);
        let low = base * self.low_multiplier();
        let high = base * self.high_multiplier();

        let (low, base, high) = match cap {
            Some(cap) => {
                let cap = cap as f64;
                (low.min(cap), base.min(cap), high.min(cap))
            }
            None => (low, base, high),
        };

        Some(ReachEstimate {
            followers,
            conservative: round_to_granule(low, round_to, cap),
            median: round_to_granule(base, round_to, cap),
            aggressive: round_to_granule(high, round_to, cap),
            reach_per_follower: base / clamped,
            extrapolated,
        })
    }
}

fn round_to_granule(value: f64, round_to: i64, cap: Option<u64>) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let granule = if round_to <= 0 { 1.0 } else { round_to as f64 };
    let nearest = (value / granule).round() * granule;
    match cap {
        Some(cap) if nearest > cap as f64 => ((value / granule).floor() * granule) as u64,
        _ => nearest as u64,
    }
}
