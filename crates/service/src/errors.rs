use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state {0} not found")]
    NotFound(String),
    #[error("invalid state id: {0:?}")]
    InvalidId(String),
    #[error("malformed lock info: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("cannot encode lock info: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("state is locked by {held_by}, lock requested by {requested_by}")]
    Conflict { held_by: String, requested_by: String },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Stable short label used for logs and metric outcomes.
    pub fn label(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::InvalidId(_) => "invalid_id",
            StoreError::Decode(_) => "decode",
            StoreError::Encode(_) => "encode",
            StoreError::Conflict { .. } => "conflict",
            StoreError::Io { .. } => "io",
        }
    }
}
