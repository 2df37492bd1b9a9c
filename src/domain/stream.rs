use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{detection::Detection, metrics::MetricsSnapshot, model::RawOutput};

/// Frame tal como lo envía el cliente, con la carga que haya elegido adjuntar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameRequest {
    #[serde(default)]
    pub frame_id: serde_json::Value,
    pub capture_ts: i64,
    /// JPEG/PNG en base64, opcionalmente como URL `data:`.
    #[serde(default)]
    pub image_data: Option<String>,
    /// Salida del modelo calculada fuera, pendiente de decodificar aquí.
    #[serde(default)]
    pub raw_output: Option<RawOutput>,
    /// Detecciones ya calculadas en el cliente.
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResponse {
    pub frame_id: serde_json::Value,
    pub capture_ts: i64,
    pub recv_ts: i64,
    pub inference_ts: i64,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Frame(FrameRequest),
    MetricsRequest,
    Offer { sdp: String },
    IceCandidate { candidate: serde_json::Value },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Detections(FrameResponse),
    Metrics { data: MetricsSnapshot },
    Error { message: String },
}

/// Resumen tipo "2 car, 1 person" para los logs.
pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.label.as_str()).or_insert(0) += 1;
    }
    counts
        .iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}
