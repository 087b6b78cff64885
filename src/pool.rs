//! Per-run supporter snapshot and the ingestion boundary that builds it.
//!
//! Upstream rows carry loosely-typed connection payloads. They are validated
//! here into [`Supporter`] values; anything malformed is rejected with an
//! [`IngestError`] instead of reaching the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reach::MAX_FOLLOWERS;
use crate::{GenreProfile, Supporter, SupporterStatus};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("supporter record has no id")]
    MissingId,

    #[error("supporter {0} is not active ({1})")]
    NotActive(String, &'static str),

    #[error("supporter {0} has unknown status {1:?}")]
    UnknownStatus(String, String),

    #[error("supporter {0} has invalid follower count {1}")]
    InvalidFollowers(String, f64),

    #[error("supporter {0} has invalid reach factor {1}")]
    InvalidReachFactor(String, f64),

    #[error("supporter {0} has invalid engagement rate {1}")]
    InvalidEngagementRate(String, f64),
}

/// Optional fields an external connection (e.g. a linked streaming profile) may report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub follower_count: Option<f64>,
    #[serde(default)]
    pub engagement_rate: Option<f64>,
    #[serde(default)]
    pub reach_factor: Option<f64>,
}

/// A supporter row as supplied by the member store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupporterRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub credit_balance: Option<i64>,
    #[serde(default)]
    pub followers: Option<f64>,
    #[serde(default)]
    pub genre: GenreProfile,
    #[serde(default)]
    pub connection: Option<ConnectionProfile>,
}

impl SupporterRecord {
    pub fn validate(&self) -> Result<Supporter, IngestError> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(IngestError::MissingId)?
            .to_string();

        let status = match self.status.as_deref() {
            None => SupporterStatus::Active,
            Some(raw) => SupporterStatus::from_str(raw)
                .ok_or_else(|| IngestError::UnknownStatus(id.clone(), raw.to_string()))?,
        };
        if status != SupporterStatus::Active {
            return Err(IngestError::NotActive(id, status.label()));
        }

        let connection = self.connection.clone().unwrap_or_default();
        let followers = match self.followers.or(connection.follower_count) {
            None => 0,
            Some(value) if value.is_finite() && value >= 0.0 => {
                (value.floor() as u64).min(MAX_FOLLOWERS)
            }
            Some(value) => return Err(IngestError::InvalidFollowers(id, value)),
        };

        let reach_factor = match (connection.reach_factor, connection.engagement_rate) {
            (Some(factor), _) if valid_share(factor) => Some(factor),
            (Some(factor), _) => return Err(IngestError::InvalidReachFactor(id, factor)),
            (None, Some(rate)) if valid_share(rate) => Some(rate),
            (None, Some(rate)) => return Err(IngestError::InvalidEngagementRate(id, rate)),
            (None, None) => None,
        };

        let display_name = self
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        let handle = self
            .handle
            .clone()
            .filter(|handle| !handle.trim().is_empty())
            .unwrap_or_else(|| id.clone());

        Ok(Supporter {
            id,
            display_name,
            handle,
            followers,
            genre: self.genre.clone(),
            credit_balance: self.credit_balance.unwrap_or(0),
            status,
            reach_factor,
        })
    }
}

fn valid_share(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: Vec<String>,
}

/// Immutable snapshot of supporters for one allocation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupporterPool {
    supporters: Vec<Supporter>,
}

impl SupporterPool {
    pub fn new(supporters: Vec<Supporter>) -> Self {
        Self { supporters }
    }

    /// Builds a snapshot from raw rows. Zero-balance supporters are kept so the
    /// planner can report them; inactive or malformed rows are dropped.
    pub fn from_records(records: &[SupporterRecord]) -> (Self, IngestReport) {
        let mut supporters = Vec::with_capacity(records.len());
        let mut report = IngestReport::default();

        for record in records {
            match record.validate() {
                Ok(supporter) => {
                    if supporters.iter().any(|existing: &Supporter| existing.id == supporter.id) {
                        tracing::warn!(
                            supporter_id = %supporter.id,
                            "duplicate supporter record dropped"
                        );
                        report.rejected.push(format!("duplicate supporter {}", supporter.id));
                        continue;
                    }
                    supporters.push(supporter);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "supporter record rejected");
                    report.rejected.push(err.to_string());
                }
            }
        }

        report.accepted = supporters.len();
        (Self { supporters }, report)
    }

    pub fn supporters(&self) -> &[Supporter] {
        &self.supporters
    }

    pub fn iter(&self) -> impl Iterator<Item = &Supporter> {
        self.supporters.iter()
    }

    pub fn get(&self, supporter_id: &str) -> Option<&Supporter> {
        self.supporters.iter().find(|supporter| supporter.id == supporter_id)
    }

    pub fn len(&self) -> usize {
        self.supporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supporters.is_empty()
    }

    pub fn eligible_count(&self) -> usize {
        self.supporters.iter().filter(|supporter| supporter.is_eligible()).count()
    }

    pub fn total_credits(&self) -> i64 {
        self.supporters
            .iter()
            .filter(|supporter| supporter.is_eligible())
            .map(|supporter| supporter.credit_balance)
            .sum()
    }
}
