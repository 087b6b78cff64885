use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;

use crate::api::{
    parse_queue_date, ApiDayRecord, ApiDayRequest, ApiDayResponse, ApiError, ApiExecuteResponse,
    ApiPlanRequest, ApiPlanResponse, ApiProposalList, ApiReachRequest, ApiReachResponse,
    ApiResetResponse, ApiStoredProposal,
};
use supporter_alloc::{
    store::{AssignmentStore, ProposalStore},
    AdjacencyMatrix, AllocationStrategy, BatchSummary, EngineConfig, GreedyBlendedScore, ReachModel,
    SupporterPool,
};

#[derive(Clone)]
struct AppState {
    config: Arc<EngineConfig>,
    strategy: Arc<dyn AllocationStrategy>,
    reach: Arc<ReachModel>,
    assignments: Arc<AssignmentStore>,
    proposals: Arc<ProposalStore>,
}

impl AppState {
    /// A request-supplied adjacency matrix replaces the configured one for that request only.
    fn strategy_for(&self, adjacency: Option<AdjacencyMatrix>) -> Arc<dyn AllocationStrategy> {
        match adjacency {
            None => Arc::clone(&self.strategy),
            Some(matrix) => {
                let mut config = (*self.config).clone();
                config.adjacency = Some(matrix);
                Arc::new(GreedyBlendedScore::from_config(&config))
            }
        }
    }
}

pub async fn serve(args: crate::ServeArgs, config: EngineConfig) -> Result<(), String> {
    let assignments = AssignmentStore::load(config.server.assignments_path())
        .await
        .map_err(|err| format!("failed to load assignments: {}", err))?;
    let proposals = ProposalStore::load(config.server.proposals_path())
        .await
        .map_err(|err| format!("failed to load proposals: {}", err))?;

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let state = AppState {
        strategy: Arc::new(GreedyBlendedScore::from_config(&config)),
        reach: Arc::new(ReachModel::new(config.reach.clone())),
        assignments: Arc::new(assignments),
        proposals: Arc::new(proposals),
        config: Arc::new(config),
    };

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| format!("failed to bind server: {}", err))?;
    tracing::info!(%addr, "allocation server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/reach", post(reach_handler))
        .route("/api/plan", post(plan_handler))
        .route("/api/proposals", get(list_proposals))
        .route("/api/proposals/:id", get(get_proposal))
        .route("/api/proposals/:id/execute", post(execute_proposal))
        .route("/api/queue/:date/allocate", post(allocate_day))
        .route("/api/queue/:date", get(get_day).delete(reset_day))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "strategy": state.strategy.name() }))
}

async fn reach_handler(
    State(state): State<AppState>,
    Json(request): Json<ApiReachRequest>,
) -> Result<Json<ApiReachResponse>, ApiError> {
    let defaults = state.reach.config();
    let cap = request.cap.or(defaults.network_cap);
    let round_to = request.round_to.unwrap_or(defaults.round_to);
    let estimate = state
        .reach
        .estimate(request.followers, cap, round_to)
        .ok_or_else(|| ApiError::bad_request("followers must be a finite number of at least 1"))?;
    Ok(Json(ApiReachResponse { estimate }))
}

async fn plan_handler(
    State(state): State<AppState>,
    Json(request): Json<ApiPlanRequest>,
) -> Result<Json<ApiPlanResponse>, ApiError> {
    let (pool, ingest) = SupporterPool::from_records(&request.supporters);
    let strategy = state.strategy_for(request.adjacency);
    let proposal = strategy.plan(&request.target, &pool);

    let proposal_id = if request.save.unwrap_or(false) {
        Some(state.proposals.add(proposal.clone()).await?.id)
    } else {
        None
    };

    Ok(Json(ApiPlanResponse {
        strategy: strategy.name(),
        proposal_id,
        proposal,
        ingest,
    }))
}

async fn list_proposals(State(state): State<AppState>) -> Json<ApiProposalList> {
    Json(ApiProposalList {
        proposals: state.proposals.list().await,
    })
}

async fn get_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> Result<Json<ApiStoredProposal>, ApiError> {
    let proposal = state
        .proposals
        .get(&proposal_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("proposal not found: {}", proposal_id)))?;
    Ok(Json(ApiStoredProposal { proposal }))
}

async fn execute_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> Result<Json<ApiExecuteResponse>, ApiError> {
    let rows = state.proposals.execute(&proposal_id).await?;
    Ok(Json(ApiExecuteResponse { proposal_id, rows }))
}

async fn allocate_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(request): Json<ApiDayRequest>,
) -> Result<Json<ApiDayResponse>, ApiError> {
    let queue_date = parse_queue_date(&date)?;
    let (pool, ingest) = SupporterPool::from_records(&request.supporters);
    let strategy = state.strategy_for(request.adjacency);
    let dry_run = request.dry_run.unwrap_or(false);

    let assignments = if dry_run {
        strategy.allocate_day(queue_date, &request.targets, &pool)
    } else {
        state
            .assignments
            .run_day(queue_date, || strategy.allocate_day(queue_date, &request.targets, &pool))
            .await?
    };

    let summary = BatchSummary::from_assignments(queue_date, &request.targets, &assignments);
    Ok(Json(ApiDayResponse {
        strategy: strategy.name(),
        recorded: !dry_run && !assignments.is_empty(),
        summary,
        assignments,
        ingest,
    }))
}

async fn get_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ApiDayRecord>, ApiError> {
    let queue_date = parse_queue_date(&date)?;
    let day = state
        .assignments
        .get_day(queue_date)
        .await
        .ok_or_else(|| ApiError::not_found(format!("no assignments recorded for {}", queue_date)))?;
    Ok(Json(ApiDayRecord { day }))
}

async fn reset_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ApiResetResponse>, ApiError> {
    let queue_date = parse_queue_date(&date)?;
    let removed = state.assignments.reset_day(queue_date).await?;
    Ok(Json(ApiResetResponse { queue_date, removed }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
