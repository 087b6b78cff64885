use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use supporter_alloc::{
    store::{DayRecord, ScheduleRow, StoreError, StoredProposal},
    AdjacencyMatrix, BatchAssignment, BatchSummary, IngestReport, Proposal, ReachEstimate,
    SupporterRecord, Target,
};

#[derive(Debug, Deserialize)]
pub struct ApiReachRequest {
    pub followers: f64,
    pub cap: Option<u64>,
    pub round_to: Option<i64>,
}

/// Body of `POST /api/plan`; also the file format read by `plan --input`.
#[derive(Debug, Deserialize)]
pub struct ApiPlanRequest {
    pub target: Target,
    #[serde(default)]
    pub supporters: Vec<SupporterRecord>,
    #[serde(default)]
    pub adjacency: Option<AdjacencyMatrix>,
    #[serde(default)]
    pub save: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ApiPlanResponse {
    pub strategy: &'static str,
    pub proposal_id: Option<String>,
    pub proposal: Proposal,
    pub ingest: IngestReport,
}

/// Body of `POST /api/queue/:date/allocate`; also the file format read by `allocate-day --input`.
#[derive(Debug, Deserialize)]
pub struct ApiDayRequest {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub supporters: Vec<SupporterRecord>,
    #[serde(default)]
    pub adjacency: Option<AdjacencyMatrix>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ApiDayResponse {
    pub strategy: &'static str,
    pub recorded: bool,
    pub summary: BatchSummary,
    pub assignments: Vec<BatchAssignment>,
    pub ingest: IngestReport,
}

#[derive(Debug, Serialize)]
pub struct ApiExecuteResponse {
    pub proposal_id: String,
    pub rows: Vec<ScheduleRow>,
}

#[derive(Debug, Serialize)]
pub struct ApiProposalList {
    pub proposals: Vec<StoredProposal>,
}

#[derive(Debug, Serialize)]
pub struct ApiStoredProposal {
    pub proposal: StoredProposal,
}

#[derive(Debug, Serialize)]
pub struct ApiDayRecord {
    pub day: DayRecord,
}

#[derive(Debug, Serialize)]
pub struct ApiResetResponse {
    pub queue_date: NaiveDate,
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiReachResponse {
    pub estimate: ReachEstimate,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::DateAlreadyAllocated(_) | StoreError::ProposalAlreadyExecuted(_) => {
                Self::new("conflict", err.to_string())
            }
            StoreError::ProposalNotFound(_) => Self::not_found(err.to_string()),
            StoreError::Io(_) | StoreError::Serde(_) => {
                tracing::error!(error = %err, "store operation failed");
                Self::new("internal_error", "store operation failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub fn parse_queue_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("invalid queue date (YYYY-MM-DD): {}", value)))
}
