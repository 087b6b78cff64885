use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{clamp01, normalize_label, GenreProfile};

/// Admin-configured family-to-family compatibility weights.
///
/// Rows are keyed by the target's family, columns by the supporter's family.
/// Keys are normalized on insert and on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, BTreeMap<String, f64>>",
    into = "BTreeMap<String, BTreeMap<String, f64>>"
)]
pub struct AdjacencyMatrix {
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl From<BTreeMap<String, BTreeMap<String, f64>>> for AdjacencyMatrix {
    fn from(raw: BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        let mut matrix = AdjacencyMatrix::default();
        for (from, row) in raw {
            for (to, weight) in row {
                matrix.set(&from, &to, weight);
            }
            matrix.rows.entry(normalize_label(&from)).or_default();
        }
        matrix
    }
}

impl From<AdjacencyMatrix> for BTreeMap<String, BTreeMap<String, f64>> {
    fn from(matrix: AdjacencyMatrix) -> Self {
        matrix.rows
    }
}

impl AdjacencyMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, from: &str, to: &str, weight: f64) {
        self.rows
            .entry(normalize_label(from))
            .or_default()
            .insert(normalize_label(to), weight);
    }

    pub fn with(mut self, from: &str, to: &str, weight: f64) -> Self {
        self.set(from, to, weight);
        self
    }

    /// A family is known once it appears as either a row or a column key.
    pub fn knows(&self, family: &str) -> bool {
        !family.is_empty()
            && (self.rows.contains_key(family)
                || self.rows.values().any(|row| row.contains_key(family)))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Weight between two known families. The diagonal defaults to 1.0; a
    /// missing off-diagonal cell falls back to the reverse cell, then 0.0.
    pub fn weight(&self, from: &str, to: &str) -> Option<f64> {
        if !self.knows(from) || !self.knows(to) {
            return None;
        }
        let direct = self.rows.get(from).and_then(|row| row.get(to)).copied();
        let reverse = || self.rows.get(to).and_then(|row| row.get(from)).copied();
        let weight = match direct.or_else(reverse) {
            Some(weight) if weight.is_finite() => clamp01(weight),
            Some(_) => 0.0,
            None if from == to => 1.0,
            None => 0.0,
        };
        Some(weight)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    matrix: Option<AdjacencyMatrix>,
}

impl CompatibilityScorer {
    pub fn new(matrix: Option<AdjacencyMatrix>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> Option<&AdjacencyMatrix> {
        self.matrix.as_ref()
    }

    pub fn score(&self, target: &GenreProfile, supporter: &GenreProfile) -> f64 {
        score(target, supporter, self.matrix.as_ref())
    }
}

/// Genre affinity in `[0, 1]` between a target and a candidate supporter.
pub fn score(
    target: &GenreProfile,
    supporter: &GenreProfile,
    matrix: Option<&AdjacencyMatrix>,
) -> f64 {
    let weight = matrix.and_then(|matrix| matrix.weight(&target.family, &supporter.family));
    if let Some(weight) = weight {
        return weight;
    }
    if !target.family.is_empty() && target.family == supporter.family {
        return 1.0;
    }
    subgenre_overlap(target, supporter)
}

/// Fraction of the target's subgenres the supporter also carries.
pub fn subgenre_overlap(target: &GenreProfile, supporter: &GenreProfile) -> f64 {
    if target.subgenres.is_empty() {
        return 0.0;
    }
    let shared = target
        .subgenres
        .iter()
        .filter(|label| supporter.subgenres.contains(*label))
        .count();
    shared as f64 / target.subgenres.len() as f64
}
