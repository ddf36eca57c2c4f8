use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use server_api::classes::{
    self, AddStudentRequest, CreateClassRequest, ReassignTeacherRequest, UpdateClassRequest,
};
use shared::{
    domain::ClassId,
    protocol::{ClassSummary, MessageResponse},
};

use super::{created, reject, Created, HttpResult};
use crate::{app_state::AppState, extract::AuthUser};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_class).get(list_classes))
        .route("/:id", get(get_class).put(update_class).delete(delete_class))
        .route("/:id/students", post(add_student))
        .route("/:id/students/:student_id", delete(remove_student))
        .route("/:id/teacher", put(reassign_teacher))
}

async fn create_class(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(req): Json<CreateClassRequest>,
) -> Created<ClassSummary> {
    classes::create_class(&state.api, caller, req)
        .await
        .map(created)
        .map_err(reject)
}

async fn list_classes(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
) -> HttpResult<Vec<ClassSummary>> {
    classes::list_classes(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn get_class(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<ClassSummary> {
    classes::get_class(&state.api, ClassId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_class(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateClassRequest>,
) -> HttpResult<ClassSummary> {
    classes::update_class(&state.api, caller, ClassId(id), req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_class(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<MessageResponse> {
    classes::delete_class(&state.api, caller, ClassId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn add_student(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AddStudentRequest>,
) -> HttpResult<ClassSummary> {
    classes::add_student(&state.api, caller, ClassId(id), req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn remove_student(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path((id, student_id)): Path<(i64, String)>,
) -> HttpResult<ClassSummary> {
    classes::remove_student(&state.api, caller, ClassId(id), &student_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn reassign_teacher(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ReassignTeacherRequest>,
) -> HttpResult<ClassSummary> {
    classes::reassign_teacher(&state.api, caller, ClassId(id), req)
        .await
        .map(Json)
        .map_err(reject)
}
