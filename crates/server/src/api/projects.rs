use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use server_api::projects::{self, CreateProjectRequest, StatusRequest, UpdateProjectRequest};
use shared::{
    domain::ProjectId,
    protocol::{MessageResponse, ProjectSummary},
};

use super::{created, reject, Created, HttpResult};
use crate::{app_state::AppState, extract::AuthUser};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_project).get(list_projects))
        .route(
            "/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/:id/status", patch(set_status))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> Created<ProjectSummary> {
    projects::create_project(&state.api, caller, req)
        .await
        .map(created)
        .map_err(reject)
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
) -> HttpResult<Vec<ProjectSummary>> {
    projects::list_projects(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<ProjectSummary> {
    projects::get_project(&state.api, ProjectId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> HttpResult<ProjectSummary> {
    projects::update_project(&state.api, caller, ProjectId(id), req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> HttpResult<ProjectSummary> {
    projects::set_status(&state.api, caller, ProjectId(id), req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<MessageResponse> {
    projects::delete_project(&state.api, caller, ProjectId(id))
        .await
        .map(Json)
        .map_err(reject)
}
