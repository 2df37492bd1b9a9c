pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    http::{HeaderName, HeaderValue},
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};

use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/metrics", get(routes::get_metrics))
        .route("/api/metrics/benchmark", get(routes::get_benchmark))
        .route("/api/metrics/export", post(routes::export_metrics))
        .route("/api/metrics/reset", post(routes::reset_metrics))
        .route("/api/config", get(routes::get_config))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// API + estáticos, con las cabeceras de aislamiento cross-origin que necesitan los hilos wasm del navegador.
pub fn app(state: HttpState, static_dir: &Path, models_dir: &Path) -> Router {
    router(state)
        .nest_service("/models", ServeDir::new(models_dir))
        .fallback_service(ServeDir::new(static_dir))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-embedder-policy"),
            HeaderValue::from_static("require-corp"),
        ))
}
