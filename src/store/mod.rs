//! JSON-file adapters for the storage boundary.
//!
//! The engine never persists anything itself. These stores hold what callers
//! persist and refuse the misuse cases the engine cannot see: a second batch
//! run for a populated date, or executing a proposal twice.

pub mod assignments;
pub mod proposals;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use thiserror::Error;

pub use assignments::{AssignmentStore, DayRecord};
pub use proposals::{ProposalStore, ScheduleRow, StoredProposal};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("assignments already recorded for {0}; reset the date before running again")]
    DateAlreadyAllocated(NaiveDate),

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("proposal already executed: {0}")]
    ProposalAlreadyExecuted(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

async fn read_json<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let data = tokio::fs::read_to_string(path).await?;
    if data.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&data)?)
}

async fn write_json<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let payload = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, payload).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
