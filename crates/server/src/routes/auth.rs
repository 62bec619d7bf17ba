use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use subtle::ConstantTimeEq;

pub const DEFAULT_REALM: &str = "restricted";

/// Username/password pairs accepted by [`require_basic_auth`].
#[derive(Debug, Clone)]
pub struct BasicAuth {
    realm: String,
    credentials: HashMap<String, String>,
}

impl BasicAuth {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        Self { realm: DEFAULT_REALM.to_string(), credentials }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.credentials.get(username) {
            Some(expected) => constant_time_eq(expected.as_bytes(), password.as_bytes()),
            None => false,
        }
    }

    fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Middleware: require `Authorization: Basic` credentials matching the configured pair.
/// Missing or wrong credentials get 401 with a `WWW-Authenticate` challenge.
pub async fn require_basic_auth(
    State(auth): State<Arc<BasicAuth>>,
    req: Request,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .typed_get::<Authorization<Basic>>()
        .map(|Authorization(basic)| auth.verify(basic.username(), basic.password()))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!(path = %req.uri().path(), method = %req.method(), "basic auth failed");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, auth.challenge())],
            StatusCode::UNAUTHORIZED.canonical_reason().unwrap_or_default(),
        )
            .into_response();
    }

    next.run(req).await
}
