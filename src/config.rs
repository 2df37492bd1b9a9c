use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{dto::DetectionMode, metrics_service::AggregatorConfig};
use crate::domain::model::{DetectionParams, ImageSize};

/// Servidor de detección en tiempo real: recibe frames por WebSocket,
/// ejecuta YOLO (opcional) y agrega métricas de latencia.
#[derive(Debug, Clone, Parser)]
#[command(name = "rtc-detect-server", version, about)]
pub struct ServerConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// wasm: detección en el navegador. server: ONNX Runtime en este proceso.
    #[arg(long, env = "MODE", value_enum, default_value_t = DetectionMode::Wasm)]
    pub mode: DetectionMode,

    #[arg(long, env = "MODEL_PATH", default_value = "models/yolov5n.onnx")]
    pub model_path: PathBuf,

    #[arg(long, default_value_t = 640)]
    pub input_width: u32,

    #[arg(long, default_value_t = 640)]
    pub input_height: u32,

    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value_t = 0.5)]
    pub confidence_threshold: f32,

    #[arg(long, default_value_t = 0.4)]
    pub iou_threshold: f32,

    /// Sólo se reenvía al cliente.
    #[arg(long, env = "MAX_DETECTIONS", default_value_t = 8)]
    pub max_detections: usize,

    /// Milisegundos entre detecciones en el cliente.
    #[arg(long, env = "DETECTION_INTERVAL", default_value_t = 2000)]
    pub detection_interval: u64,

    #[arg(long, default_value_t = 1000)]
    pub frame_capacity: usize,

    #[arg(long, default_value_t = 100)]
    pub system_capacity: usize,

    #[arg(long, default_value_t = 5)]
    pub sample_interval_secs: u64,

    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, default_value = "models")]
    pub models_dir: PathBuf,

    #[arg(long, default_value = "metrics")]
    pub metrics_dir: PathBuf,

    #[arg(long, env = "DEBUG")]
    pub debug: bool,
}

impl ServerConfig {
    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            input_size: ImageSize::new(self.input_width, self.input_height),
            conf_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            frame_capacity: self.frame_capacity,
            system_capacity: self.system_capacity,
            // interval() entra en pánico con periodo cero
            sample_interval: Duration::from_secs(self.sample_interval_secs.max(1)),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
