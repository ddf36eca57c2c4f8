use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::de::DeserializeOwned;
use server_api::{auth::verify_token, Caller};
use shared::error::{ApiError, ErrorCode};

use crate::{
    api::{reject, HttpError},
    app_state::AppState,
};

/// The authenticated caller, decoded from an `Authorization: Bearer` header.
pub(crate) struct AuthUser(pub(crate) Caller);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                reject(ApiError::new(
                    ErrorCode::Unauthorized,
                    "Authentication required",
                ))
            })?;
        verify_token(&state.api.auth, token)
            .map(AuthUser)
            .map_err(reject)
    }
}

/// JSON body that decodes an empty request as `T::default()` and ignores the
/// content type.
pub(crate) struct LenientJson<T>(pub(crate) T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for LenientJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| reject(ApiError::new(ErrorCode::Validation, err.body_text())))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes).map(Self).map_err(|err| {
            reject(ApiError::new(
                ErrorCode::Validation,
                format!("Invalid JSON body: {err}"),
            ))
        })
    }
}
