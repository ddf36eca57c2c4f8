//! Request-independent service layer. Every operation takes an [`ApiContext`]
//! plus already-decoded input and returns a DTO or an [`ApiError`].

use shared::error::{ApiError, ErrorCode};
use storage::Storage;
use tracing::error;

pub mod auth;
pub mod classes;
pub mod evaluations;
pub mod forms;
pub mod presentations;
pub mod projects;
pub mod relay;
pub mod teams;

pub use auth::{AuthConfig, Caller};
pub use relay::Relay;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub auth: AuthConfig,
    pub relay: Relay,
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "storage failure");
    ApiError::new(ErrorCode::Internal, "Server error")
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Validation, message)
}

fn not_found(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::NotFound, message)
}

fn forbidden(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Forbidden, message)
}

/// Trimmed, non-empty text or `None`.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod support;
