use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::adapters::http::state::HttpState;
use crate::application::dto::{BenchmarkQuery, ErrorResponse, ExportRequest, ExportResponse, OkResponse};
use crate::domain::errors::DomainError;

const DEFAULT_BENCHMARK_SECS: u64 = 30;
const DEFAULT_EXPORT_NAME: &str = "metrics.json";

fn error_response(e: &DomainError) -> Response {
    let status = match e {
        DomainError::NoData | DomainError::NoRecentData { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidInput(_) | DomainError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

pub async fn get_metrics(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.metrics.current_metrics())
}

pub async fn get_benchmark(
    State(st): State<HttpState>,
    Query(query): Query<BenchmarkQuery>,
) -> Response {
    let duration = query.duration.unwrap_or(DEFAULT_BENCHMARK_SECS);
    match st.metrics.benchmark_summary(duration) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn export_metrics(
    State(st): State<HttpState>,
    Json(req): Json<ExportRequest>,
) -> Response {
    let name = req.filename.as_deref().unwrap_or(DEFAULT_EXPORT_NAME);
    match st.metrics.export_snapshot(name, req.since_ms).await {
        Ok(path) => Json(ExportResponse { ok: true, path: path.display().to_string() }).into_response(),
        Err(e) => {
            error!("❌ Metrics export failed: {}", e);
            error_response(&e)
        }
    }
}

pub async fn reset_metrics(State(st): State<HttpState>) -> impl IntoResponse {
    st.metrics.reset();
    Json(OkResponse { ok: true })
}

pub async fn get_config(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.client.as_ref().clone())
}
