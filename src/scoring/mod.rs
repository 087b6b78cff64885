pub mod compatibility;
pub mod pipeline;

pub use compatibility::{AdjacencyMatrix, CompatibilityScorer};
pub use pipeline::{sort_candidates, CandidateRanker, Exclusion, RankingConfig, ScoredCandidate};
