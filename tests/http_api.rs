use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

use rtc_detect_server::{
    adapters::{
        export::json_file::JsonFileSink,
        http::{app, router, state::HttpState},
        system::clock::ManualClock,
    },
    application::{
        dto::{ClientConfig, DetectionMode},
        metrics_service::{AggregatorConfig, MetricsAggregator},
        services::FramePipelineService,
    },
    domain::model::DetectionParams,
};

const T0: i64 = 1_700_000_000_000;

struct Harness {
    clock: Arc<ManualClock>,
    metrics: Arc<MetricsAggregator>,
    state: HttpState,
}

fn harness(metrics_dir: &Path) -> Harness {
    let clock = Arc::new(ManualClock::new(T0));
    let metrics = Arc::new(MetricsAggregator::new(
        AggregatorConfig::default(),
        clock.clone(),
        Arc::new(JsonFileSink::new(metrics_dir)),
    ));
    let params = DetectionParams::default();
    let state = HttpState {
        pipeline: Arc::new(FramePipelineService::new(
            None,
            params.clone(),
            metrics.clone(),
            clock.clone(),
        )),
        metrics: metrics.clone(),
        client: Arc::new(ClientConfig::new(DetectionMode::Wasm, &params, 2000, 8)),
    };
    Harness { clock, metrics, state }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn metrics_endpoint_reports_recorded_frames() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.clock.set_ms(T0 + 2_000);
    h.metrics.record_frame(T0 + 1_900, T0 + 1_940, T0 + 1_970, 3, Some(T0 + 2_000));

    let (status, body) = send(router(h.state), get("/api/metrics")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_frames"], 1);
    assert_eq!(body["total_detections"], 3);
    assert_eq!(body["runtime_seconds"], 2.0);
    assert_eq!(body["latency"]["end_to_end"]["median"], 100.0);
    assert!(body.get("system").is_none());
}

#[tokio::test]
async fn benchmark_without_frames_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (status, body) = send(router(h.state.clone()), get("/api/metrics/benchmark")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No hay métricas disponibles");

    h.metrics.record_frame(T0 - 100, T0 - 80, T0 - 60, 1, Some(T0 - 40));
    h.clock.set_ms(T0 + 60_000);
    let (status, body) = send(router(h.state.clone()), get("/api/metrics/benchmark?duration=10")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No hay métricas en los últimos 10 segundos");

    let (status, body) = send(router(h.state), get("/api/metrics/benchmark?duration=120")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frames_processed"], 1);
    assert_eq!(body["duration_seconds"], 120);
}

#[tokio::test]
async fn config_reflects_the_detection_params() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (status, body) = send(router(h.state), get("/api/config")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "mode": "wasm",
            "confidence_threshold": 0.5,
            "iou_threshold": 0.4,
            "detection_interval": 2000,
            "max_detections": 8,
            "input_width": 640,
            "input_height": 640
        })
    );
}

#[tokio::test]
async fn reset_clears_the_counters() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.metrics.record_frame(T0, T0, T0, 4, None);

    let (status, body) = send(router(h.state), post_json("/api/metrics/reset", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(h.metrics.current_metrics().total_frames, 0);
}

#[tokio::test]
async fn export_writes_a_file_and_rejects_bad_names() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.metrics.record_frame(T0 - 50, T0 - 30, T0 - 10, 2, None);

    let (status, body) =
        send(router(h.state.clone()), post_json("/api/metrics/export", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let written = dir.path().join("metrics.json");
    assert_eq!(body["path"], written.display().to_string());
    assert!(written.exists());

    let (status, body) = send(
        router(h.state),
        post_json("/api/metrics/export", json!({"filename": "../../etc/passwd"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("nombre de exportación inválido"));
}

#[tokio::test]
async fn full_app_sets_isolation_headers_and_serves_static_files() {
    let metrics_dir = tempfile::tempdir().unwrap();
    let static_dir = tempfile::tempdir().unwrap();
    let models_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<h1>demo</h1>").unwrap();
    std::fs::write(models_dir.path().join("yolov5n.onnx"), b"not really a model").unwrap();

    let h = harness(metrics_dir.path());
    let app = app(h.state, static_dir.path(), models_dir.path());

    let res = app.clone().oneshot(get("/index.html")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["cross-origin-opener-policy"], "same-origin");
    assert_eq!(res.headers()["cross-origin-embedder-policy"], "require-corp");
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>demo</h1>");

    let res = app.clone().oneshot(get("/models/yolov5n.onnx")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.oneshot(get("/api/metrics")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["cross-origin-opener-policy"], "same-origin");
}
