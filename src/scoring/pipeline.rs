use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::scoring::CompatibilityScorer;
use crate::{Supporter, Target};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Share of followers reached by a repost when the supporter has no measured factor.
    pub default_reach_factor: f64,
    pub compatibility_floor: f64,
    pub compatibility_boost: f64,
    pub compatibility_weight: f64,
    pub reach_weight: f64,
    pub reach_normalizer: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_reach_factor: 0.06,
            compatibility_floor: 0.7,
            compatibility_boost: 0.3,
            compatibility_weight: 0.6,
            reach_weight: 0.4,
            reach_normalizer: 1000.0,
        }
    }
}

/// Why a supporter cannot be matched to a target at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Owner,
    Inactive,
    NoCredit,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub supporter: &'a Supporter,
    pub compatibility_score: f64,
    pub estimated_reach: u64,
    pub blended_score: f64,
}

impl ScoredCandidate<'_> {
    pub fn supporter_id(&self) -> &str {
        &self.supporter.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateRanker {
    config: RankingConfig,
    scorer: CompatibilityScorer,
}

impl CandidateRanker {
    pub fn new(config: RankingConfig, scorer: CompatibilityScorer) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn scorer(&self) -> &CompatibilityScorer {
        &self.scorer
    }

    pub fn exclusion(&self, target: &Target, supporter: &Supporter) -> Option<Exclusion> {
        if supporter.id == target.owner_member_id {
            Some(Exclusion::Owner)
        } else if !supporter.is_active() {
            Some(Exclusion::Inactive)
        } else if supporter.credit_balance <= 0 {
            Some(Exclusion::NoCredit)
        } else {
            None
        }
    }

    pub fn reach_factor(&self, supporter: &Supporter) -> f64 {
        supporter
            .reach_factor
            .filter(|factor| factor.is_finite() && *factor > 0.0)
            .unwrap_or(self.config.default_reach_factor)
    }

    /// Reach grows with compatibility, from `floor` up to `floor + boost` of the base.
    pub fn estimated_reach(&self, supporter: &Supporter, compatibility_score: f64) -> u64 {
        let boost =
            self.config.compatibility_floor + self.config.compatibility_boost * compatibility_score;
        let reach = supporter.followers as f64 * self.reach_factor(supporter) * boost;
        if reach.is_finite() && reach > 0.0 {
            reach.floor() as u64
        } else {
            0
        }
    }

    pub fn blended_score(&self, compatibility_score: f64, estimated_reach: u64) -> f64 {
        let normalizer = if self.config.reach_normalizer > 0.0 {
            self.config.reach_normalizer
        } else {
            1.0
        };
        self.config.compatibility_weight * compatibility_score
            + self.config.reach_weight * (estimated_reach as f64 / normalizer)
    }

    pub fn score_supporter<'a>(
        &self,
        target: &Target,
        supporter: &'a Supporter,
    ) -> ScoredCandidate<'a> {
        let compatibility_score = self.scorer.score(&target.genre, &supporter.genre);
        let estimated_reach = self.estimated_reach(supporter, compatibility_score);
        ScoredCandidate {
            supporter,
            compatibility_score,
            estimated_reach,
            blended_score: self.blended_score(compatibility_score, estimated_reach),
        }
    }

    /// Scores every supporter and orders them best first. Filtering is left to the caller.
    pub fn rank<'a, I>(&self, target: &Target, supporters: I) -> Vec<ScoredCandidate<'a>>
    where
        I: IntoIterator<Item = &'a Supporter>,
    {
        let mut candidates: Vec<ScoredCandidate<'a>> = supporters
            .into_iter()
            .map(|supporter| self.score_supporter(target, supporter))
            .collect();
        sort_candidates(&mut candidates);
        candidates
    }
}

/// Descending blended score, ties broken by supporter id ascending.
pub fn sort_candidates(candidates: &mut [ScoredCandidate<'_>]) {
    candidates.sort_by(|a, b| {
        b.blended_score
            .partial_cmp(&a.blended_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.supporter.id.cmp(&b.supporter.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenreProfile, SupporterStatus};

    fn house_target() -> Target {
        Target::new("t", "owner", GenreProfile::family("House"), 1_000)
    }

    #[test]
    fn blended_score_weights_compatibility_and_reach() {
        let ranker = CandidateRanker::default();
        assert!((ranker.blended_score(1.0, 60) - 0.624).abs() < 1e-9);
        assert!((ranker.blended_score(0.5, 2_500) - 1.3).abs() < 1e-9);
        assert!((ranker.blended_score(0.0, 0)).abs() < 1e-9);
    }

    #[test]
    fn non_positive_normalizer_leaves_reach_unscaled() {
        let config = RankingConfig {
            reach_normalizer: 0.0,
            ..RankingConfig::default()
        };
        let ranker = CandidateRanker::new(config, CompatibilityScorer::default());
        assert!((ranker.blended_score(0.0, 3) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn large_reach_outranks_a_small_perfect_match() {
        let pool = [
            Supporter::new("match", 1_000, GenreProfile::family("House"), 5),
            Supporter::new("big", 100_000, GenreProfile::family("Techno"), 5),
        ];

        let ranked = CandidateRanker::default().rank(&house_target(), pool.iter());

        assert_eq!(ranked[0].supporter_id(), "big");
        assert_eq!(ranked[0].estimated_reach, 4_200);
        assert!((ranked[0].blended_score - 1.68).abs() < 1e-9);
        assert_eq!(ranked[1].supporter_id(), "match");
        assert!((ranked[1].blended_score - 0.624).abs() < 1e-9);
    }

    #[test]
    fn perfect_match_outranks_a_modest_mismatch() {
        let pool = [
            Supporter::new("small", 10_000, GenreProfile::family("Techno"), 5),
            Supporter::new("match", 1_000, GenreProfile::family("House"), 5),
        ];

        let ranked = CandidateRanker::default().rank(&house_target(), pool.iter());

        assert_eq!(ranked[0].supporter_id(), "match");
        assert_eq!(ranked[1].supporter_id(), "small");
        assert_eq!(ranked[1].estimated_reach, 420);
        assert!((ranked[1].blended_score - 0.168).abs() < 1e-9);
    }

    #[test]
    fn personal_reach_factor_overrides_default() {
        let ranker = CandidateRanker::default();
        let mut supporter = Supporter::new("s", 10_000, GenreProfile::family("House"), 5);
        assert!((ranker.reach_factor(&supporter) - 0.06).abs() < 1e-12);

        supporter.reach_factor = Some(0.1);
        assert_eq!(ranker.estimated_reach(&supporter, 1.0), 1_000);

        supporter.reach_factor = Some(f64::NAN);
        assert!((ranker.reach_factor(&supporter) - 0.06).abs() < 1e-12);
    }

    #[test]
    fn owner_exclusion_comes_first() {
        let ranker = CandidateRanker::default();
        let mut owner = Supporter::new("owner", 1_000, GenreProfile::family("House"), 0);
        owner.status = SupporterStatus::Suspended;
        assert_eq!(ranker.exclusion(&house_target(), &owner), Some(Exclusion::Owner));

        let broke = Supporter::new("b", 1_000, GenreProfile::family("House"), 0);
        assert_eq!(ranker.exclusion(&house_target(), &broke), Some(Exclusion::NoCredit));
    }
}
