//! HTTP transport: router construction and shared handler state.

pub mod handlers;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::openapi::ApiDoc;
use crate::service::HelloService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn HelloService>,
}

impl AppState {
    pub fn new(service: Arc<dyn HelloService>) -> Self {
        Self { service }
    }
}

/// Build the HTTP router: both hello endpoints, the API docs, request tracing and a body size cap.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/v1/sayhello", post(handlers::hello::say_hello_v1))
        .route("/v2/sayhello", post(handlers::hello::say_hello_v2))
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
        .route(
            "/swagger/openapi.json",
            axum::routing::get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .merge(Scalar::with_url("/swagger", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
