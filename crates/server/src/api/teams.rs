use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use server_api::teams::{self, AddMemberRequest, CreateTeamRequest};
use shared::{
    domain::{ClassId, ProjectId, TeamId},
    protocol::{MessageResponse, TeamSummary},
};

use super::{created, reject, Created, HttpResult};
use crate::{app_state::AppState, extract::AuthUser};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_team))
        .route("/class/:class_id", get(list_for_class))
        .route("/project/:project_id", get(list_for_project))
        .route("/:id", get(get_team).patch(update_team).delete(delete_team))
        .route("/:id/members", post(add_member))
}

async fn create_team(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Json(req): Json<CreateTeamRequest>,
) -> Created<TeamSummary> {
    teams::create_team(&state.api, req)
        .await
        .map(created)
        .map_err(reject)
}

async fn list_for_class(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(class_id): Path<i64>,
) -> HttpResult<Vec<TeamSummary>> {
    teams::list_teams_for_class(&state.api, ClassId(class_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn list_for_project(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(project_id): Path<i64>,
) -> HttpResult<Vec<TeamSummary>> {
    teams::list_teams_for_project(&state.api, ProjectId(project_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn get_team(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<TeamSummary> {
    teams::get_team(&state.api, TeamId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_team(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(updates): Json<Map<String, Value>>,
) -> HttpResult<TeamSummary> {
    teams::update_team(&state.api, caller, TeamId(id), updates)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_team(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<MessageResponse> {
    teams::delete_team(&state.api, caller, TeamId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> HttpResult<TeamSummary> {
    teams::add_member(&state.api, caller, TeamId(id), req)
        .await
        .map(Json)
        .map_err(reject)
}
