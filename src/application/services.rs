use base64::{prelude::BASE64_STANDARD, Engine};
use image::RgbImage;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    application::{
        metrics_service::MetricsAggregator,
        ports::{ClockPort, InferencePort},
    },
    domain::{
        decode::decode,
        detection::Detection,
        errors::{DomainError, DomainResult},
        model::{DetectionParams, ImageSize, RawOutput, COCO_CLASSES},
        stream::{summarize_detections, FrameRequest, FrameResponse},
        suppression::suppress,
    },
};

/// Orquestador del pipeline por frame: decodifica, infiere, filtra con NMS y
/// registra las métricas del frame.
///
/// Sin motor de inferencia (modo "wasm") la detección ocurre en el navegador y
/// los frames con imagen devuelven una lista vacía.
#[derive(Clone)]
pub struct FramePipelineService {
    engine: Option<Arc<dyn InferencePort>>,
    params: DetectionParams,
    metrics: Arc<MetricsAggregator>,
    clock: Arc<dyn ClockPort>,
}

impl FramePipelineService {
    pub fn new(
        engine: Option<Arc<dyn InferencePort>>,
        params: DetectionParams,
        metrics: Arc<MetricsAggregator>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self { engine, params, metrics, clock }
    }

    pub async fn process_frame(&self, frame: FrameRequest) -> FrameResponse {
        let recv_ts = self.clock.now_ms();

        let detections = if let Some(detections) = frame.detections {
            detections
        } else if let Some(raw) = frame.raw_output.as_ref() {
            let original = ImageSize::new(
                frame.width.unwrap_or(self.params.input_size.width),
                frame.height.unwrap_or(self.params.input_size.height),
            );
            self.postprocess(raw, original)
        } else if let Some(image_data) = frame.image_data.as_deref() {
            match self.detect_image(image_data).await {
                Ok(detections) => detections,
                Err(e) => {
                    error!("❌ Detection error: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let inference_ts = self.clock.now_ms();
        if !detections.is_empty() {
            debug!("🔍 Frame {}: {}", frame.frame_id, summarize_detections(&detections));
        }

        self.metrics.record_frame(
            frame.capture_ts,
            recv_ts,
            inference_ts,
            detections.len() as u64,
            None,
        );

        FrameResponse {
            frame_id: frame.frame_id,
            capture_ts: frame.capture_ts,
            recv_ts,
            inference_ts,
            detections,
        }
    }

    /// Decodificador + NMS sobre un tensor crudo.
    pub fn postprocess(&self, raw: &RawOutput, original: ImageSize) -> Vec<Detection> {
        let candidates = decode(
            raw,
            self.params.input_size,
            original,
            self.params.conf_threshold,
            &COCO_CLASSES,
        );
        suppress(candidates, self.params.iou_threshold)
    }

    async fn detect_image(&self, image_data: &str) -> DomainResult<Vec<Detection>> {
        let Some(engine) = self.engine.clone() else {
            return Ok(Vec::new());
        };

        let rgb = decode_image(image_data)?;
        let original = ImageSize::new(rgb.width(), rgb.height());
        let started = std::time::Instant::now();

        let raw = tokio::task::spawn_blocking(move || engine.infer(&rgb))
            .await
            .map_err(|e| DomainError::OperationFailed(format!("tarea de inferencia: {}", e)))??;

        let detections = self.postprocess(&raw, original);
        debug!(
            "🔍 Detected {} objects in {:.3}s",
            detections.len(),
            started.elapsed().as_secs_f32()
        );
        Ok(detections)
    }
}

/// Base64 (opcionalmente como URL `data:`) a un frame RGB.
fn decode_image(image_data: &str) -> DomainResult<RgbImage> {
    let payload = match image_data.split_once(',') {
        Some((_, rest)) => rest,
        None => image_data,
    };
    let bytes = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| DomainError::MalformedInput(format!("base64 de imagen: {}", e)))?;
    let img = image::load_from_memory(&bytes).map_err(|e| {
        warn!("⚠️ Unreadable frame image ({} bytes)", bytes.len());
        DomainError::MalformedInput(format!("decodificación de imagen: {}", e))
    })?;
    Ok(img.to_rgb8())
}
