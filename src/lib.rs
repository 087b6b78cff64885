pub mod allocation;
pub mod calibration;
pub mod config;
pub mod pool;
pub mod reach;
pub mod scoring;
pub mod store;
pub mod user;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use allocation::{
    AllocationEntry, AllocationPlanner, AllocationStrategy, BatchAssignment, BatchSummary,
    CreditCostRule, GreedyBlendedScore, Proposal, QueueBatchAllocator,
};
pub use config::EngineConfig;
pub use pool::{IngestError, IngestReport, SupporterPool, SupporterRecord};
pub use reach::{ReachEstimate, ReachModel};
pub use scoring::{AdjacencyMatrix, CompatibilityScorer};

/// Genre taxonomy carried by targets and supporters.
///
/// Family and subgenres are stored trimmed and lowercased so that equality
/// checks are insensitive to how the upstream store spelled them. An empty
/// family means the profile is unclassified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreProfile {
    #[serde(default, deserialize_with = "deserialize_family")]
    pub family: String,
    #[serde(default, deserialize_with = "deserialize_subgenres")]
    pub subgenres: BTreeSet<String>,
}

impl GenreProfile {
    pub fn new<I, S>(family: &str, subgenres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            family: normalize_label(family),
            subgenres: subgenres
                .into_iter()
                .map(|label| normalize_label(label.as_ref()))
                .filter(|label| !label.is_empty())
                .collect(),
        }
    }

    pub fn family(family: &str) -> Self {
        Self::new(family, std::iter::empty::<&str>())
    }

    pub fn is_unclassified(&self) -> bool {
        self.family.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.family.is_empty() && self.subgenres.is_empty()
    }
}

fn deserialize_family<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|value| normalize_label(&value)).unwrap_or_default())
}

fn deserialize_subgenres<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .map(|label| normalize_label(label))
        .filter(|label| !label.is_empty())
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupporterStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl SupporterStatus {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(SupporterStatus::Active),
            "inactive" | "paused" => Some(SupporterStatus::Inactive),
            "suspended" | "banned" => Some(SupporterStatus::Suspended),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SupporterStatus::Active => "active",
            SupporterStatus::Inactive => "inactive",
            SupporterStatus::Suspended => "suspended",
        }
    }
}

/// A member who can repost another member's track, as snapshotted for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supporter {
    pub id: String,
    pub display_name: String,
    pub handle: String,
    pub followers: u64,
    pub genre: GenreProfile,
    pub credit_balance: i64,
    pub status: SupporterStatus,
    /// Personal share of followers reached by a repost, when measured.
    pub reach_factor: Option<f64>,
}

impl Supporter {
    pub fn new(id: &str, followers: u64, genre: GenreProfile, credit_balance: i64) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            handle: id.to_string(),
            followers,
            genre,
            credit_balance,
            status: SupporterStatus::Active,
            reach_factor: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SupporterStatus::Active
    }

    pub fn is_eligible(&self) -> bool {
        self.is_active() && self.credit_balance > 0
    }
}

/// A submission or campaign asking for promotional support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub owner_member_id: String,
    #[serde(default)]
    pub genre: GenreProfile,
    #[serde(default)]
    pub desired_reach: u64,
}

impl Target {
    pub fn new(id: &str, owner_member_id: &str, genre: GenreProfile, desired_reach: u64) -> Self {
        Self {
            id: id.to_string(),
            owner_member_id: owner_member_id.to_string(),
            genre,
            desired_reach,
        }
    }

    /// No genre and nothing to reach: there is nothing to plan for.
    pub fn is_degenerate(&self) -> bool {
        self.genre.is_empty() && self.desired_reach == 0
    }
}

pub fn normalize_label(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.max(0.0).min(1.0)
}

pub(crate) fn stable_hash64(value: &str) -> u64 {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

pub fn format_number(value: f64) -> String {
    let rounded = value.round().max(0.0) as i64;
    let mut chars: Vec<char> = rounded.to_string().chars().collect();
    let mut result = String::new();
    let mut count = 0usize;

    while let Some(ch) = chars.pop() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(ch);
        count += 1;
    }

    result.chars().rev().collect()
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn format_float(value: f64, digits: usize) -> String {
    format!("{:.1$}", value, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_profile_normalizes_labels() {
        let profile = GenreProfile::new("  Deep  House ", ["Tech House", "", "tech house"]);
        assert_eq!(profile.family, "deep house");
        assert_eq!(profile.subgenres.len(), 1);
        assert!(profile.subgenres.contains("tech house"));
    }

    #[test]
    fn genre_profile_deserializes_null_fields() {
        let profile: GenreProfile =
            serde_json::from_str(r#"{"family": null, "subgenres": ["Garage"]}"#).unwrap();
        assert!(profile.is_unclassified());
        assert!(profile.subgenres.contains("garage"));
    }

    #[test]
    fn degenerate_target_has_no_genre_and_no_reach() {
        let target = Target::new("t1", "owner", GenreProfile::default(), 0);
        assert!(target.is_degenerate());
        let target = Target::new("t2", "owner", GenreProfile::family("house"), 0);
        assert!(!target.is_degenerate());
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(1234567.4), "1,234,567");
        assert_eq!(format_number(999.0), "999");
    }
}
