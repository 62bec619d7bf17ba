use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use service::backend::StateBackend;

pub mod auth;
pub mod state;

/// Largest state document or lock payload accepted in a request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared handler state: the storage backend plus optional basic-auth credentials.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StateBackend>,
    pub auth: Option<Arc<auth::BasicAuth>>,
}

impl AppState {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend, auth: None }
    }

    pub fn with_auth(mut self, auth: auth::BasicAuth) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: liveness routes plus the state routes
/// (`GET`/`POST`/`DELETE`/`LOCK`/`UNLOCK` on `/:id`), the latter behind basic
/// auth when credentials are configured.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let mut states = Router::new()
        .route(
            "/:id",
            get(state::get_state)
                .post(state::update_state)
                .delete(state::purge_state)
                .fallback(state::lock_methods),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));
    if let Some(creds) = state.auth.clone() {
        // `layer` rather than `route_layer`: the LOCK/UNLOCK fallback must be covered too
        states = states.layer(middleware::from_fn_with_state(creds, auth::require_basic_auth));
    }

    let public = Router::new()
        .route("/", get(health))
        .route("/health", get(health));

    public
        .merge(states)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // one span per request with method and path, at INFO
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // status code and latency
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
