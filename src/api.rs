// src/api.rs
//! Operator-facing HTTP surface: health, job status, and the manual
//! trigger that runs a job through the same guarded path a scheduled
//! tick uses.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::pipeline::Pipeline;
use crate::scheduler::{JobStatus, Scheduler, TickOutcome};
use crate::store::Source;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub pipeline: Arc<Pipeline>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/sources", get(sources))
        .route("/collect", post(collect))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<Vec<JobStatus>> {
    Json(state.scheduler.status())
}

async fn sources(State(state): State<AppState>) -> Json<Vec<Source>> {
    Json(state.pipeline.registry().all_sources())
}

#[derive(Deserialize)]
struct CollectParams {
    /// A job id, or "all" to run every registered job in order.
    task: String,
}

#[derive(Serialize)]
struct ManualRunResult {
    job_id: String,
    #[serde(flatten)]
    outcome: TickOutcome,
}

async fn collect(
    State(state): State<AppState>,
    Query(params): Query<CollectParams>,
) -> (StatusCode, Json<Vec<ManualRunResult>>) {
    let results = state.scheduler.run_manually(&params.task).await;
    let unknown_only = results
        .iter()
        .all(|(_, o)| matches!(o, TickOutcome::UnknownJob));
    let code = if unknown_only {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    let body = results
        .into_iter()
        .map(|(job_id, outcome)| ManualRunResult { job_id, outcome })
        .collect();
    (code, Json(body))
}
