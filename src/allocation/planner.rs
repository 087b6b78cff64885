//! Single-target allocation: pick supporters until the desired reach is met.

use serde::{Deserialize, Serialize};

use crate::allocation::CreditCostRule;
use crate::pool::SupporterPool;
use crate::scoring::{CandidateRanker, Exclusion};
use crate::{Supporter, Target};

pub const REACH_SHORTFALL: &str = "Target reach may not be achievable with the current supporter pool.";
pub const HIGH_CREDIT_COST: &str = "High credit cost: this allocation spends more credits than usual.";
pub const LOW_COMPATIBILITY: &str = "Low genre compatibility between the target and selected supporters.";
pub const SPLIT_CAMPAIGN: &str = "Consider splitting into multiple campaigns; the supporter cap was reached.";
pub const NO_SUPPORTERS: &str = "No eligible supporters available for this target.";
pub const NOTHING_TO_PLAN: &str = "Target has no genre and no desired reach; nothing to allocate.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_supporters: usize,
    pub shortfall_ratio: f64,
    pub high_credit_threshold: i64,
    pub low_compatibility_threshold: f64,
    pub max_conflicts: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_supporters: 50,
            shortfall_ratio: 0.8,
            high_credit_threshold: 100,
            low_compatibility_threshold: 0.3,
            max_conflicts: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub supporter_id: String,
    pub estimated_reach: u64,
    pub compatibility_score: f64,
    pub credits_required: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub target_id: String,
    pub entries: Vec<AllocationEntry>,
    pub total_reach: u64,
    pub total_credits: i64,
    pub conflicts: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Proposal {
    pub fn empty(target_id: &str) -> Self {
        Self {
            target_id: target_id.to_string(),
            entries: Vec::new(),
            total_reach: 0,
            total_credits: 0,
            conflicts: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn supporter_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.supporter_id.as_str())
    }

    pub fn mean_compatibility(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let sum: f64 = self.entries.iter().map(|entry| entry.compatibility_score).sum();
        Some(sum / self.entries.len() as f64)
    }

    pub fn has_recommendation(&self, message: &str) -> bool {
        self.recommendations.iter().any(|existing| existing == message)
    }

    fn recommend(&mut self, message: &str) {
        if !self.has_recommendation(message) {
            self.recommendations.push(message.to_string());
        }
    }
}

/// Bounded conflict list: the first `limit` messages verbatim, then a count.
struct ConflictLog {
    messages: Vec<String>,
    overflow: usize,
    limit: usize,
}

impl ConflictLog {
    fn new(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            overflow: 0,
            limit,
        }
    }

    fn push(&mut self, message: String) {
        if self.messages.len() < self.limit {
            self.messages.push(message);
        } else {
            self.overflow += 1;
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.overflow > 0 {
            self.messages
                .push(format!("{} more supporters excluded", self.overflow));
        }
        self.messages
    }
}

#[derive(Debug, Clone, Default)]
pub struct AllocationPlanner {
    config: PlannerConfig,
    ranker: CandidateRanker,
    costing: CreditCostRule,
}

impl AllocationPlanner {
    pub fn new(config: PlannerConfig, ranker: CandidateRanker, costing: CreditCostRule) -> Self {
        Self {
            config,
            ranker,
            costing,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn ranker(&self) -> &CandidateRanker {
        &self.ranker
    }

    pub fn plan(&self, target: &Target, pool: &SupporterPool) -> Proposal {
        let mut proposal = Proposal::empty(&target.id);

        if target.is_degenerate() {
            proposal.recommend(NOTHING_TO_PLAN);
            return proposal;
        }

        let mut conflicts = ConflictLog::new(self.config.max_conflicts);
        let eligible: Vec<&Supporter> = pool
            .iter()
            .filter(|supporter| self.admit(target, supporter, &mut conflicts))
            .collect();
        proposal.conflicts = conflicts.finish();

        if eligible.is_empty() {
            proposal.recommend(NO_SUPPORTERS);
        }

        let candidates = self.ranker.rank(target, eligible);
        for candidate in &candidates {
            if proposal.total_reach >= target.desired_reach
                || proposal.entries.len() >= self.config.max_supporters
            {
                break;
            }
            let credits_required = self.costing.cost(candidate.supporter.credit_balance);
            proposal.total_reach = proposal.total_reach.saturating_add(candidate.estimated_reach);
            proposal.total_credits = proposal.total_credits.saturating_add(credits_required);
            proposal.entries.push(AllocationEntry {
                supporter_id: candidate.supporter.id.clone(),
                estimated_reach: candidate.estimated_reach,
                compatibility_score: candidate.compatibility_score,
                credits_required,
            });
        }

        let cap_hit = proposal.entries.len() >= self.config.max_supporters
            && proposal.total_reach < target.desired_reach;
        self.recommend(target, &mut proposal, cap_hit);

        tracing::debug!(
            target_id = %target.id,
            candidates = candidates.len(),
            accepted = proposal.entries.len(),
            total_reach = proposal.total_reach,
            desired_reach = target.desired_reach,
            "planned allocation"
        );

        proposal
    }

    fn admit(&self, target: &Target, supporter: &Supporter, conflicts: &mut ConflictLog) -> bool {
        match self.ranker.exclusion(target, supporter) {
            Some(Exclusion::Owner) => false,
            Some(Exclusion::Inactive) => {
                conflicts.push(format!("supporter {} is not active", supporter.id));
                false
            }
            Some(Exclusion::NoCredit) => {
                conflicts.push(format!(
                    "supporter {} has insufficient credits (balance {})",
                    supporter.id, supporter.credit_balance
                ));
                false
            }
            None => match self.costing.affordable_cost(supporter.credit_balance) {
                Some(_) => true,
                None => {
                    conflicts.push(format!(
                        "supporter {} cannot cover a repost (balance {}, cost {})",
                        supporter.id,
                        supporter.credit_balance,
                        self.costing.cost(supporter.credit_balance)
                    ));
                    false
                }
            },
        }
    }

    fn recommend(&self, target: &Target, proposal: &mut Proposal, cap_hit: bool) {
        let desired = target.desired_reach as f64;
        if desired > 0.0 && (proposal.total_reach as f64) < self.config.shortfall_ratio * desired {
            proposal.recommend(REACH_SHORTFALL);
        }
        if proposal.total_credits > self.config.high_credit_threshold {
            proposal.recommend(HIGH_CREDIT_COST);
        }
        if let Some(mean) = proposal.mean_compatibility() {
            if mean < self.config.low_compatibility_threshold {
                proposal.recommend(LOW_COMPATIBILITY);
            }
        }
        if cap_hit {
            proposal.recommend(SPLIT_CAMPAIGN);
        }
    }
}
