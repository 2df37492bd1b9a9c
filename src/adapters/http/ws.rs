use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use tracing::{error, info, warn};

use crate::adapters::http::state::HttpState;
use crate::domain::stream::{ClientMessage, ServerMessage};

const NO_PEER_CONNECTION: &str =
    "este servidor no negocia conexiones WebRTC; envía los frames por este socket";

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

async fn handle_socket(mut socket: WebSocket, st: HttpState) {
    info!("📱 New WebSocket connection");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
        };
        let reply = match msg {
            Message::Text(text) => handle_text(&st, &text).await,
            Message::Close(_) => break,
            _ => continue,
        };

        let json = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode reply: {}", e);
                continue;
            }
        };
        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    info!("📱 WebSocket disconnected");
}

/// Un mensaje de texto entra, exactamente una respuesta sale.
pub async fn handle_text(st: &HttpState, text: &str) -> ServerMessage {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            error!("Invalid JSON: {}", e);
            return ServerMessage::Error { message: format!("mensaje inválido: {}", e) };
        }
    };

    match msg {
        ClientMessage::Frame(frame) => ServerMessage::Detections(st.pipeline.process_frame(frame).await),
        ClientMessage::MetricsRequest => ServerMessage::Metrics { data: st.metrics.current_metrics() },
        ClientMessage::Offer { .. } | ClientMessage::IceCandidate { .. } => {
            warn!("⚠️ WebRTC signaling message ignored");
            ServerMessage::Error { message: NO_PEER_CONNECTION.into() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::system::clock::ManualClock;
    use crate::application::{
        dto::{ClientConfig, DetectionMode},
        metrics_service::{AggregatorConfig, MetricsAggregator},
        ports::MetricsSinkPort,
        services::FramePipelineService,
    };
    use crate::domain::{errors::DomainResult, metrics::MetricsExport, model::DetectionParams};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct NullSink;

    #[async_trait]
    impl MetricsSinkPort for NullSink {
        async fn write(&self, name: &str, _: &MetricsExport) -> DomainResult<PathBuf> {
            Ok(PathBuf::from(name))
        }
    }

    fn state() -> HttpState {
        let clock = Arc::new(ManualClock::new(10_000));
        let metrics = Arc::new(MetricsAggregator::new(
            AggregatorConfig::default(),
            clock.clone(),
            Arc::new(NullSink),
        ));
        let params = DetectionParams::default();
        HttpState {
            pipeline: Arc::new(FramePipelineService::new(None, params.clone(), metrics.clone(), clock)),
            metrics,
            client: Arc::new(ClientConfig::new(DetectionMode::Wasm, &params, 2000, 8)),
        }
    }

    #[tokio::test]
    async fn frame_message_gets_a_detections_reply() {
        let st = state();
        let reply = handle_text(
            &st,
            r#"{"type":"frame","frame_id":12,"capture_ts":9900,
                "detections":[{"label":"cup","score":0.8,"xmin":0.1,"ymin":0.1,"xmax":0.3,"ymax":0.4}]}"#,
        )
        .await;

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "detections");
        assert_eq!(json["frame_id"], 12);
        assert_eq!(json["recv_ts"], 10_000);
        assert_eq!(json["detections"][0]["label"], "cup");
        assert_eq!(st.metrics.current_metrics().total_frames, 1);
    }

    #[tokio::test]
    async fn metrics_request_returns_the_snapshot() {
        let st = state();
        let reply = handle_text(&st, r#"{"type":"metrics-request"}"#).await;
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "metrics");
        assert_eq!(json["data"]["total_frames"], 0);
    }

    #[tokio::test]
    async fn bad_json_and_signaling_get_error_replies() {
        let st = state();
        for text in ["{not json", r#"{"type":"offer","sdp":"v=0"}"#, r#"{"type":"nope"}"#] {
            let json = serde_json::to_value(handle_text(&st, text).await).unwrap();
            assert_eq!(json["type"], "error");
        }
        assert_eq!(st.metrics.current_metrics().total_frames, 0);
    }
}
