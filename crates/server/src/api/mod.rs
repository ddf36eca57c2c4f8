//! REST surface. Handlers decode the request, call the matching
//! `server_api` operation and map its [`ApiError`] onto an HTTP status.

use std::sync::Arc;

use axum::{http::StatusCode, Json, Router};
use shared::error::{ApiError, ErrorCode};

use crate::app_state::AppState;

mod auth;
mod classes;
mod evaluations;
mod forms;
mod presentations;
mod projects;
mod teams;

pub(crate) type HttpError = (StatusCode, Json<ApiError>);
pub(crate) type HttpResult<T> = Result<Json<T>, HttpError>;
pub(crate) type Created<T> = Result<(StatusCode, Json<T>), HttpError>;

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reject(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

fn created<T>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}

/// Every `/api/*` route, still waiting for its state.
pub(crate) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/classes", classes::routes())
        .nest("/projects", projects::routes())
        .nest("/teams", teams::routes())
        .nest("/evaluation-forms", forms::routes())
        .nest("/evaluations", evaluations::routes())
        .nest("/presentations", presentations::routes())
}
