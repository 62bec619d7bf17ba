use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::AppState;
use crate::errors::ApiError;

pub const LOCK_METHOD: &str = "LOCK";
pub const UNLOCK_METHOD: &str = "UNLOCK";

/// Body returned by a successful purge, whether or not the state existed.
pub const PURGED_BODY: &str = r#"{"state": "tfstate deleted"}"#;

pub async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Vec<u8>, ApiError> {
    Ok(state.backend.get(&id).await?)
}

/// Store the request body as the new state and echo it back.
pub async fn update_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Bytes, ApiError> {
    state.backend.update(&id, &body).await?;
    Ok(body)
}

pub async fn purge_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<&'static str, ApiError> {
    state.backend.purge(&id).await?;
    Ok(PURGED_BODY)
}

/// Returns the stored lock record, which differs from the request on a refresh.
pub async fn lock_state(state: AppState, id: String, body: Bytes) -> Result<Vec<u8>, ApiError> {
    Ok(state.backend.lock(&id, &body).await?)
}

/// Echoes the request body on success.
pub async fn unlock_state(state: AppState, id: String, body: Bytes) -> Result<Bytes, ApiError> {
    state.backend.unlock(&id, &body).await?;
    Ok(body)
}

/// Dispatch for the non-standard `LOCK`/`UNLOCK` verbs, which the method
/// router cannot register directly; anything else on `/:id` is a 405.
pub async fn lock_methods(
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    match method.as_str() {
        LOCK_METHOD => lock_state(state, id, body).await.into_response(),
        UNLOCK_METHOD => unlock_state(state, id, body).await.into_response(),
        other => {
            debug!(method = %other, %id, "unsupported method");
            StatusCode::METHOD_NOT_ALLOWED.into_response()
        }
    }
}
