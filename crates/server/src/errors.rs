use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use service::errors::StoreError;
use thiserror::Error;
use tracing::{error, info};

/// Store failure on its way out as an HTTP response.
///
/// Bodies carry only the canonical reason phrase (`Not Found`, `Conflict`, ...);
/// the detailed error goes to the log.
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::InvalidId(_) => StatusCode::BAD_REQUEST,
            StoreError::Decode(_) | StoreError::Encode(_) | StoreError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, kind = self.0.label(), "request failed");
        } else {
            info!(error = %self.0, kind = self.0.label(), status = status.as_u16(), "request rejected");
        }
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
