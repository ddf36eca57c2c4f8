use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use server_api::evaluations::{self, SubmitEvaluationRequest};
use shared::{
    domain::{EvaluationId, ProjectId},
    protocol::{EvaluationRecord, MessageResponse},
};

use super::{created, reject, Created, HttpResult};
use crate::{app_state::AppState, extract::AuthUser};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/project/:project_id", get(list_for_project))
        .route("/:id", get(get_evaluation).delete(delete_evaluation))
        .route("/:id/submit", post(submit))
}

async fn list_for_project(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
) -> HttpResult<Vec<EvaluationRecord>> {
    evaluations::list_for_project(&state.api, ProjectId(project_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(evaluation_id): Path<i64>,
) -> HttpResult<EvaluationRecord> {
    evaluations::get_evaluation(&state.api, EvaluationId(evaluation_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn submit(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<SubmitEvaluationRequest>,
) -> Created<EvaluationRecord> {
    evaluations::submit(&state.api, caller, ProjectId(project_id), req)
        .await
        .map(created)
        .map_err(reject)
}

async fn delete_evaluation(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(evaluation_id): Path<i64>,
) -> HttpResult<MessageResponse> {
    evaluations::delete_evaluation(&state.api, caller, EvaluationId(evaluation_id))
        .await
        .map(Json)
        .map_err(reject)
}
