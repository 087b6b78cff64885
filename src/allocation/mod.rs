pub mod batch;
pub mod costing;
pub mod planner;

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::pool::SupporterPool;
use crate::scoring::{CandidateRanker, CompatibilityScorer};
use crate::Target;

pub use batch::{BatchAssignment, BatchConfig, BatchSummary, QueueBatchAllocator};
pub use costing::CreditCostRule;
pub use planner::{AllocationEntry, AllocationPlanner, PlannerConfig, Proposal};

/// Seam between the allocation contracts and the algorithm that fills them.
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan(&self, target: &Target, pool: &SupporterPool) -> Proposal;

    fn allocate_day(
        &self,
        queue_date: NaiveDate,
        targets: &[Target],
        pool: &SupporterPool,
    ) -> Vec<BatchAssignment>;
}

/// Greedy selection by blended compatibility/reach score.
#[derive(Debug, Clone, Default)]
pub struct GreedyBlendedScore {
    planner: AllocationPlanner,
    batch: QueueBatchAllocator,
}

impl GreedyBlendedScore {
    pub fn new(planner: AllocationPlanner, batch: QueueBatchAllocator) -> Self {
        Self { planner, batch }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let scorer = CompatibilityScorer::new(config.adjacency.clone());
        let ranker = CandidateRanker::new(config.ranking.clone(), scorer);
        let planner =
            AllocationPlanner::new(config.planner.clone(), ranker.clone(), config.costing);
        let batch = QueueBatchAllocator::new(config.batch.clone(), ranker, config.costing);
        Self::new(planner, batch)
    }

    pub fn planner(&self) -> &AllocationPlanner {
        &self.planner
    }

    pub fn batch(&self) -> &QueueBatchAllocator {
        &self.batch
    }
}

impl AllocationStrategy for GreedyBlendedScore {
    fn name(&self) -> &'static str {
        "greedy_blended_score"
    }

    fn plan(&self, target: &Target, pool: &SupporterPool) -> Proposal {
        self.planner.plan(target, pool)
    }

    fn allocate_day(
        &self,
        queue_date: NaiveDate,
        targets: &[Target],
        pool: &SupporterPool,
    ) -> Vec<BatchAssignment> {
        self.batch.allocate_day(queue_date, targets, pool)
    }
}
