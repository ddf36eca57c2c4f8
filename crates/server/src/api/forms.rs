use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use server_api::forms::{self, FormRequest, SubmitFormRequest};
use shared::{
    domain::{FormId, ProjectId},
    protocol::{EvaluationFormSummary, EvaluationRecord, MessageResponse},
};

use super::{created, reject, Created, HttpResult};
use crate::{app_state::AppState, extract::AuthUser};

// `:id` is a form id for PUT/DELETE and a project id for submit; the router
// needs one parameter name per path segment.
pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_form))
        .route("/project/:project_id", get(form_for_project))
        .route("/:id", put(update_form).delete(delete_form))
        .route("/:id/submit", post(submit))
}

async fn create_form(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(req): Json<FormRequest>,
) -> Created<EvaluationFormSummary> {
    forms::create_form(&state.api, caller, req)
        .await
        .map(created)
        .map_err(reject)
}

async fn form_for_project(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
) -> HttpResult<EvaluationFormSummary> {
    forms::form_for_project(&state.api, ProjectId(project_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_form(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(form_id): Path<i64>,
    Json(req): Json<FormRequest>,
) -> HttpResult<EvaluationFormSummary> {
    forms::update_form(&state.api, caller, FormId(form_id), req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_form(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(form_id): Path<i64>,
) -> HttpResult<MessageResponse> {
    forms::delete_form(&state.api, caller, FormId(form_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn submit(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<SubmitFormRequest>,
) -> Created<EvaluationRecord> {
    forms::submit(&state.api, caller, ProjectId(project_id), req)
        .await
        .map(created)
        .map_err(reject)
}
