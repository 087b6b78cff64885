use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::allocation::Proposal;
use crate::stable_hash64;
use crate::store::{read_json, write_json, StoreError};

const MAX_PROPOSALS: usize = 50;

static PROPOSAL_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProposal {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub proposal: Proposal,
}

/// A schedule row produced when a proposal is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub proposal_id: String,
    pub target_id: String,
    pub supporter_id: String,
    pub slot: usize,
    pub credits: i64,
}

pub struct ProposalStore {
    path: PathBuf,
    proposals: Mutex<Vec<StoredProposal>>,
}

impl ProposalStore {
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let proposals: Vec<StoredProposal> = read_json(&path).await?;
        Ok(Self {
            path,
            proposals: Mutex::new(proposals),
        })
    }

    pub async fn list(&self) -> Vec<StoredProposal> {
        let guard = self.proposals.lock().await;
        guard.clone()
    }

    pub async fn get(&self, proposal_id: &str) -> Option<StoredProposal> {
        let guard = self.proposals.lock().await;
        guard.iter().find(|stored| stored.id == proposal_id).cloned()
    }

    /// Keeps the most recent proposals first; older ones fall off past the limit.
    pub async fn add(&self, proposal: Proposal) -> Result<StoredProposal, StoreError> {
        let created_at = Utc::now();
        let counter = PROPOSAL_COUNTER.fetch_add(1, Ordering::Relaxed);
        let seed = format!(
            "{}:{}:{}",
            proposal.target_id,
            created_at.timestamp_nanos_opt().unwrap_or_default(),
            counter
        );
        let stored = StoredProposal {
            id: format!("proposal_{:x}", stable_hash64(&seed)),
            created_at,
            executed_at: None,
            proposal,
        };

        let mut guard = self.proposals.lock().await;
        guard.insert(0, stored.clone());
        if guard.len() > MAX_PROPOSALS {
            guard.truncate(MAX_PROPOSALS);
        }
        write_json(&self.path, guard.as_slice()).await?;
        Ok(stored)
    }

    pub async fn delete(&self, proposal_id: &str) -> Result<bool, StoreError> {
        let mut guard = self.proposals.lock().await;
        let before = guard.len();
        guard.retain(|stored| stored.id != proposal_id);
        let removed = guard.len() != before;
        if removed {
            write_json(&self.path, guard.as_slice()).await?;
        }
        Ok(removed)
    }

    /// Turns a proposal's entries into schedule rows, once.
    pub async fn execute(&self, proposal_id: &str) -> Result<Vec<ScheduleRow>, StoreError> {
        let mut guard = self.proposals.lock().await;
        let stored = guard
            .iter_mut()
            .find(|stored| stored.id == proposal_id)
            .ok_or_else(|| StoreError::ProposalNotFound(proposal_id.to_string()))?;
        if stored.executed_at.is_some() {
            return Err(StoreError::ProposalAlreadyExecuted(proposal_id.to_string()));
        }

        stored.executed_at = Some(Utc::now());
        let rows: Vec<ScheduleRow> = stored
            .proposal
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| ScheduleRow {
                proposal_id: stored.id.clone(),
                target_id: stored.proposal.target_id.clone(),
                supporter_id: entry.supporter_id.clone(),
                slot: idx + 1,
                credits: entry.credits_required,
            })
            .collect();

        if let Err(err) = write_json(&self.path, guard.as_slice()).await {
            if let Some(stored) = guard.iter_mut().find(|stored| stored.id == proposal_id) {
                stored.executed_at = None;
            }
            return Err(err);
        }

        tracing::info!(proposal_id, rows = rows.len(), "executed proposal");
        Ok(rows)
    }
}
