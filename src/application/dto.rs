use serde::{Deserialize, Serialize};

use crate::domain::model::DetectionParams;

/// Dónde se ejecuta la detección.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// En el navegador; el servidor sólo recoge métricas.
    Wasm,
    /// En el servidor, con ONNX Runtime.
    Server,
}

/// Configuración que el cliente web consulta al arrancar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub mode: DetectionMode,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub detection_interval: u64,
    pub max_detections: usize,
    pub input_width: u32,
    pub input_height: u32,
}

impl ClientConfig {
    pub fn new(
        mode: DetectionMode,
        params: &DetectionParams,
        detection_interval: u64,
        max_detections: usize,
    ) -> Self {
        Self {
            mode,
            confidence_threshold: params.conf_threshold,
            iou_threshold: params.iou_threshold,
            detection_interval,
            max_detections,
            input_width: params.input_size.width,
            input_height: params.input_size.height,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkQuery {
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub since_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub ok: bool,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
