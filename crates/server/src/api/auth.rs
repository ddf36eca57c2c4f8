use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use server_api::auth::{
    self, CreateTeacherRequest, LoginRequest, PeerLoginRequest, RegisterRequest,
};
use shared::{
    domain::UserId,
    protocol::{AuthResponse, MessageResponse, UserRef, UserSummary},
};

use super::{created, reject, Created, HttpResult};
use crate::{app_state::AppState, extract::AuthUser};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/teacher/login", post(teacher_login))
        .route("/peer/login", post(peer_login))
        .route("/create-teacher", post(create_teacher))
        .route("/teachers", get(list_teachers))
        .route("/teacher/:id", delete(delete_teacher))
        .route("/me", get(me))
        .route("/public/teachers", get(public_teachers))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Created<AuthResponse> {
    auth::register(&state.api, req)
        .await
        .map(created)
        .map_err(reject)
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HttpResult<AuthResponse> {
    auth::login(&state.api, req).await.map(Json).map_err(reject)
}

async fn teacher_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HttpResult<AuthResponse> {
    auth::teacher_login(&state.api, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn peer_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PeerLoginRequest>,
) -> HttpResult<AuthResponse> {
    auth::peer_login(&state.api, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn create_teacher(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(req): Json<CreateTeacherRequest>,
) -> Created<UserSummary> {
    auth::create_teacher(&state.api, caller, req)
        .await
        .map(created)
        .map_err(reject)
}

async fn list_teachers(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> HttpResult<Vec<UserSummary>> {
    auth::list_teachers(&state.api, caller)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_teacher(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<MessageResponse> {
    auth::delete_teacher(&state.api, caller, UserId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> HttpResult<UserSummary> {
    auth::me(&state.api, caller).await.map(Json).map_err(reject)
}

async fn public_teachers(State(state): State<Arc<AppState>>) -> HttpResult<Vec<UserRef>> {
    auth::public_teachers(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}
