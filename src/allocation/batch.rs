//! Day-level allocation across a queue of targets sharing one supporter pool.
//!
//! Credit balances are copied out of the snapshot at the start of each run and
//! only that private copy is debited; the caller's pool is never touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::allocation::CreditCostRule;
use crate::pool::SupporterPool;
use crate::scoring::CandidateRanker;
use crate::Target;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Desired reach one supporter is expected to cover.
    pub reach_per_supporter: u64,
    pub min_supporters: usize,
    pub max_supporters: usize,
    pub max_assignments_per_supporter: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            reach_per_supporter: 500,
            min_supporters: 1,
            max_supporters: 5,
            max_assignments_per_supporter: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAssignment {
    pub queue_date: NaiveDate,
    pub target_id: String,
    pub supporter_id: String,
    /// Display order across the whole run; carries no scheduling time.
    pub position: u64,
    pub credits_allocated: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub queue_date: NaiveDate,
    pub targets_total: usize,
    pub targets_filled: usize,
    pub skipped_target_ids: Vec<String>,
    pub assignments: usize,
    pub credits_allocated: i64,
}

impl BatchSummary {
    pub fn from_assignments(
        queue_date: NaiveDate,
        targets: &[Target],
        assignments: &[BatchAssignment],
    ) -> Self {
        let skipped_target_ids: Vec<String> = targets
            .iter()
            .filter(|target| !assignments.iter().any(|a| a.target_id == target.id))
            .map(|target| target.id.clone())
            .collect();
        Self {
            queue_date,
            targets_total: targets.len(),
            targets_filled: targets.len() - skipped_target_ids.len(),
            skipped_target_ids,
            assignments: assignments.len(),
            credits_allocated: assignments.iter().map(|a| a.credits_allocated).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InRunCredit {
    balance: i64,
    assignments: usize,
}

#[derive(Debug, Clone, Default)]
pub struct QueueBatchAllocator {
    config: BatchConfig,
    ranker: CandidateRanker,
    costing: CreditCostRule,
}

impl QueueBatchAllocator {
    pub fn new(config: BatchConfig, ranker: CandidateRanker, costing: CreditCostRule) -> Self {
        Self {
            config,
            ranker,
            costing,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// `ceil(desired_reach / reach_per_supporter)`, clamped to the configured range.
    pub fn supporters_for(&self, desired_reach: u64) -> usize {
        let per_supporter = self.config.reach_per_supporter.max(1);
        let wanted = desired_reach.div_ceil(per_supporter);
        let min = self.config.min_supporters.max(1);
        let max = self.config.max_supporters.max(min);
        usize::try_from(wanted).unwrap_or(usize::MAX).clamp(min, max)
    }

    pub fn allocate_day(
        &self,
        queue_date: NaiveDate,
        targets: &[Target],
        pool: &SupporterPool,
    ) -> Vec<BatchAssignment> {
        let mut ledger: HashMap<&str, InRunCredit> = pool
            .iter()
            .map(|supporter| {
                (
                    supporter.id.as_str(),
                    InRunCredit {
                        balance: supporter.credit_balance,
                        assignments: 0,
                    },
                )
            })
            .collect();

        let mut assignments = Vec::new();
        let mut position = 0u64;

        for target in targets {
            if target.is_degenerate() {
                tracing::warn!(
                    target_id = %target.id,
                    "skipping target without genre or desired reach"
                );
                continue;
            }

            let wanted = self.supporters_for(target.desired_reach);
            let candidates = self.ranker.rank(
                target,
                pool.iter()
                    .filter(|supporter| self.ranker.exclusion(target, supporter).is_none()),
            );

            let mut selected = 0usize;
            for candidate in &candidates {
                if selected >= wanted {
                    break;
                }
                if candidate.compatibility_score <= 0.0 {
                    continue;
                }
                let Some(credit) = ledger.get_mut(candidate.supporter_id()) else {
                    continue;
                };
                if credit.assignments >= self.config.max_assignments_per_supporter {
                    continue;
                }
                let Some(cost) = self.costing.affordable_cost(credit.balance) else {
                    continue;
                };

                credit.balance -= cost;
                credit.assignments += 1;
                position += 1;
                selected += 1;
                assignments.push(BatchAssignment {
                    queue_date,
                    target_id: target.id.clone(),
                    supporter_id: candidate.supporter.id.clone(),
                    position,
                    credits_allocated: cost,
                });
            }

            if selected == 0 {
                tracing::warn!(
                    target_id = %target.id,
                    "no compatible supporters left; target skipped"
                );
            } else {
                tracing::debug!(target_id = %target.id, wanted, selected, "target allocated");
            }
        }

        tracing::info!(
            queue_date = %queue_date,
            targets = targets.len(),
            assignments = assignments.len(),
            "batch allocation complete"
        );

        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenreProfile, Supporter};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn supporter(id: &str, family: &str, followers: u64, credits: i64) -> Supporter {
        Supporter::new(id, followers, GenreProfile::family(family), credits)
    }

    #[test]
    fn supporter_count_tracks_desired_reach() {
        let allocator = QueueBatchAllocator::default();
        assert_eq!(allocator.supporters_for(0), 1);
        assert_eq!(allocator.supporters_for(500), 1);
        assert_eq!(allocator.supporters_for(501), 2);
        assert_eq!(allocator.supporters_for(1_800), 4);
        assert_eq!(allocator.supporters_for(90_000), 5);
    }

    #[test]
    fn positions_increase_across_targets() {
        let pool = SupporterPool::new(vec![
            supporter("a", "house", 20_000, 10),
            supporter("b", "house", 10_000, 10),
            supporter("c", "techno", 30_000, 10),
        ]);
        let targets = vec![
            Target::new("t1", "x", GenreProfile::family("house"), 1_000),
            Target::new("t2", "y", GenreProfile::family("techno"), 400),
        ];

        let assignments = QueueBatchAllocator::default().allocate_day(date(), &targets, &pool);

        let rows: Vec<(&str, &str, u64)> = assignments
            .iter()
            .map(|a| (a.target_id.as_str(), a.supporter_id.as_str(), a.position))
            .collect();
        assert_eq!(rows, vec![("t1", "a", 1), ("t1", "b", 2), ("t2", "c", 3)]);
        assert!(assignments.iter().all(|a| a.queue_date == date() && a.credits_allocated == 1));
    }

    #[test]
    fn owner_is_never_assigned_to_own_target() {
        let pool = SupporterPool::new(vec![
            supporter("owner", "house", 90_000, 10),
            supporter("b", "house", 1_000, 10),
        ]);
        let targets = vec![Target::new("t1", "owner", GenreProfile::family("house"), 2_000)];

        let assignments = QueueBatchAllocator::default().allocate_day(date(), &targets, &pool);

        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].supporter_id, "b");
    }

    #[test]
    fn incompatible_targets_are_skipped() {
        let pool = SupporterPool::new(vec![supporter("a", "house", 5_000, 10)]);
        let targets = vec![
            Target::new("metal", "x", GenreProfile::family("metal"), 500),
            Target::new("house", "x", GenreProfile::family("house"), 500),
        ];

        let assignments = QueueBatchAllocator::default().allocate_day(date(), &targets, &pool);

        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].target_id, "house");
        assert_eq!(assignments[0].position, 1);

        let summary = BatchSummary::from_assignments(date(), &targets, &assignments);
        assert_eq!(summary.skipped_target_ids, vec!["metal".to_string()]);
        assert_eq!(summary.targets_filled, 1);
    }

    #[test]
    fn degenerate_targets_are_skipped_without_position_gaps() {
        let pool = SupporterPool::new(vec![
            supporter("a", "house", 20_000, 10),
            supporter("b", "house", 10_000, 10),
        ]);
        let targets = vec![
            Target::new("t1", "x", GenreProfile::family("house"), 400),
            Target::new("empty", "x", GenreProfile::default(), 0),
            Target::new("t3", "y", GenreProfile::family("house"), 400),
        ];

        let assignments = QueueBatchAllocator::default().allocate_day(date(), &targets, &pool);

        assert!(assignments.iter().all(|a| a.target_id != "empty"));
        let positions: Vec<u64> = assignments.iter().map(|a| a.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(assignments[1].target_id, "t3");
    }

    #[test]
    fn graduated_costing_exhausts_supporters() {
        let pool = SupporterPool::new(vec![supporter("a", "house", 5_000, 120)]);
        let targets: Vec<Target> = (0..3)
            .map(|idx| Target::new(&format!("t{}", idx), "x", GenreProfile::family("house"), 500))
            .collect();
        let allocator = QueueBatchAllocator::new(
            BatchConfig::default(),
            CandidateRanker::default(),
            CreditCostRule::graduated(),
        );

        let assignments = allocator.allocate_day(date(), &targets, &pool);

        // 120 -> pays 70, 50 left -> pays 50, 0 left -> skipped.
        let credits: Vec<i64> = assignments.iter().map(|a| a.credits_allocated).collect();
        assert_eq!(credits, vec![70, 50]);
        assert_eq!(pool.get("a").unwrap().credit_balance, 120);
    }

    #[test]
    fn per_supporter_cap_limits_assignments() {
        let pool = SupporterPool::new(vec![supporter("a", "house", 5_000, 100)]);
        let targets: Vec<Target> = (0..5)
            .map(|idx| Target::new(&format!("t{}", idx), "x", GenreProfile::family("house"), 500))
            .collect();

        let assignments = QueueBatchAllocator::default().allocate_day(date(), &targets, &pool);

        assert_eq!(assignments.len(), 3);
    }
}
