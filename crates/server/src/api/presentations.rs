use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use server_api::presentations::{
    self, FormPushBody, QueueBody, TeamBody, TimerBody, ToggleBody,
};
use shared::{domain::ProjectId, protocol::MessageResponse};

use super::{reject, HttpResult};
use crate::{
    app_state::AppState,
    extract::{AuthUser, LenientJson},
};

// The browser client sometimes posts these without a body; that means `{}`.
pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:project_id/start", post(start))
        .route("/:project_id/end", post(end))
        .route("/:project_id/queue", post(update_queue))
        .route("/:project_id/evaluation", post(toggle_evaluation))
        .route("/:project_id/current-team", post(update_current_team))
        .route("/:project_id/timer", post(update_timer))
        .route("/:project_id/evaluation-form", post(push_evaluation_form))
}

async fn start(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<TeamBody>,
) -> HttpResult<MessageResponse> {
    presentations::start(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}

async fn end(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<TeamBody>,
) -> HttpResult<MessageResponse> {
    presentations::end(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_queue(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<QueueBody>,
) -> HttpResult<MessageResponse> {
    presentations::update_queue(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}

async fn toggle_evaluation(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<ToggleBody>,
) -> HttpResult<MessageResponse> {
    presentations::toggle_evaluation(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_current_team(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<TeamBody>,
) -> HttpResult<MessageResponse> {
    presentations::update_current_team(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_timer(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<TimerBody>,
) -> HttpResult<MessageResponse> {
    presentations::update_timer(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}

async fn push_evaluation_form(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
    LenientJson(body): LenientJson<FormPushBody>,
) -> HttpResult<MessageResponse> {
    presentations::push_evaluation_form(&state.api, ProjectId(project_id), body)
        .await
        .map(Json)
        .map_err(reject)
}
