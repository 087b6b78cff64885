use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::allocation::BatchAssignment;
use crate::store::{read_json, write_json, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub queue_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub assignments: Vec<BatchAssignment>,
}

/// Persisted batch assignments, one record per queue date.
pub struct AssignmentStore {
    path: PathBuf,
    days: Mutex<Vec<DayRecord>>,
}

impl AssignmentStore {
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let days: Vec<DayRecord> = read_json(&path).await?;
        Ok(Self {
            path,
            days: Mutex::new(days),
        })
    }

    pub async fn is_populated(&self, queue_date: NaiveDate) -> bool {
        let guard = self.days.lock().await;
        guard.iter().any(|day| day.queue_date == queue_date)
    }

    pub async fn get_day(&self, queue_date: NaiveDate) -> Option<DayRecord> {
        let guard = self.days.lock().await;
        guard.iter().find(|day| day.queue_date == queue_date).cloned()
    }

    /// Dates with recorded assignments and how many rows each holds, oldest first.
    pub async fn list_days(&self) -> Vec<(NaiveDate, usize)> {
        let guard = self.days.lock().await;
        let mut days: Vec<(NaiveDate, usize)> = guard
            .iter()
            .map(|day| (day.queue_date, day.assignments.len()))
            .collect();
        days.sort();
        days
    }

    /// Runs `allocate` and records its output, holding the store lock throughout so
    /// two runs for the same date cannot interleave. A populated date is refused
    /// before `allocate` is called. An empty result leaves the date unpopulated.
    pub async fn run_day<F>(
        &self,
        queue_date: NaiveDate,
        allocate: F,
    ) -> Result<Vec<BatchAssignment>, StoreError>
    where
        F: FnOnce() -> Vec<BatchAssignment>,
    {
        let mut guard = self.days.lock().await;
        if guard.iter().any(|day| day.queue_date == queue_date) {
            return Err(StoreError::DateAlreadyAllocated(queue_date));
        }

        let assignments = allocate();
        if assignments.is_empty() {
            return Ok(assignments);
        }

        guard.push(DayRecord {
            queue_date,
            recorded_at: Utc::now(),
            assignments: assignments.clone(),
        });
        if let Err(err) = write_json(&self.path, guard.as_slice()).await {
            guard.retain(|day| day.queue_date != queue_date);
            return Err(err);
        }

        tracing::info!(
            queue_date = %queue_date,
            assignments = assignments.len(),
            "recorded batch assignments"
        );
        Ok(assignments)
    }

    pub async fn record_day(
        &self,
        queue_date: NaiveDate,
        assignments: Vec<BatchAssignment>,
    ) -> Result<Vec<BatchAssignment>, StoreError> {
        self.run_day(queue_date, move || assignments).await
    }

    /// Explicit reset; returns whether anything was removed.
    pub async fn reset_day(&self, queue_date: NaiveDate) -> Result<bool, StoreError> {
        let mut guard = self.days.lock().await;
        let before = guard.len();
        guard.retain(|day| day.queue_date != queue_date);
        let removed = guard.len() != before;
        if removed {
            write_json(&self.path, guard.as_slice()).await?;
            tracing::info!(queue_date = %queue_date, "reset batch assignments");
        }
        Ok(removed)
    }
}
