use anyhow::{bail, Result};
use image::{imageops::FilterType, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

use crate::application::{dto::DetectionMode, ports::InferencePort};
use crate::domain::{
    errors::{DomainError, DomainResult},
    model::{DetectionParams, ImageSize, RawOutput},
};

/// Motor YOLO sobre ONNX Runtime (CPU). Devuelve el tensor crudo; el
/// decodificado y el NMS los hace el dominio.
pub struct OnnxYoloEngine {
    // Session::run necesita &mut
    session: Mutex<Session>,
    input_size: ImageSize,
}

impl OnnxYoloEngine {
    /// Carga el modelo. El tamaño de entrada sale del propio modelo; `fallback`
    /// sólo se usa si sus dimensiones son dinámicas.
    pub fn load(path: &Path, fallback: ImageSize) -> Result<Self> {
        let model_bytes = fs::read(path)?;
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_memory(&model_bytes)?;

        let dims: Vec<i64> = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let input_size = input_size_from_dims(&dims, fallback);

        info!("✅ ONNX model loaded: {}", path.display());
        info!("📐 Input size: {}x{}", input_size.width, input_size.height);

        Ok(Self { session: Mutex::new(session), input_size })
    }

    pub fn input_size(&self) -> ImageSize {
        self.input_size
    }

    /// Redimensiona a la entrada del modelo y lo deja en NCHW normalizado.
    fn preprocess(&self, rgb: &RgbImage) -> Vec<f32> {
        let (w, h) = (self.input_size.width, self.input_size.height);
        let resized = image::imageops::resize(rgb, w, h, FilterType::Triangle);

        let plane = (w * h) as usize;
        let mut input = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let i = (y * w + x) as usize;
            input[i] = pixel[0] as f32 / 255.0;
            input[plane + i] = pixel[1] as f32 / 255.0;
            input[2 * plane + i] = pixel[2] as f32 / 255.0;
        }
        input
    }

    fn run(&self, rgb: &RgbImage) -> Result<RawOutput> {
        let input = self.preprocess(rgb);
        let input_shape = vec![1, 3, self.input_size.height as i64, self.input_size.width as i64];
        let input_tensor = Value::from_array((input_shape, input))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&d| d as usize).collect();
        Ok(RawOutput::new(dims, data_out.to_vec()))
    }
}

impl InferencePort for OnnxYoloEngine {
    fn infer(&self, image: &RgbImage) -> DomainResult<RawOutput> {
        self.run(image)
            .map_err(|e| DomainError::OperationFailed(format!("inferencia onnx: {}", e)))
    }
}

/// `[N, C, H, W]` del modelo; dimensiones dinámicas (`-1`) o ausentes usan `fallback`.
fn input_size_from_dims(dims: &[i64], fallback: ImageSize) -> ImageSize {
    let fixed = |d: Option<&i64>| d.copied().filter(|&v| v > 0).and_then(|v| u32::try_from(v).ok());
    match dims.len() {
        4 => ImageSize::new(
            fixed(dims.get(3)).unwrap_or(fallback.width),
            fixed(dims.get(2)).unwrap_or(fallback.height),
        ),
        _ => fallback,
    }
}

/// Motor elegido al arrancar y el modo que realmente queda activo.
pub struct EngineSelection {
    pub engine: Option<Arc<dyn InferencePort>>,
    pub mode: DetectionMode,
    pub params: DetectionParams,
}

/// En modo servidor carga el modelo. Sin fichero de modelo no se arranca; si el
/// fichero existe pero ONNX Runtime no lo acepta, se sigue en modo wasm.
pub fn select_engine(
    mode: DetectionMode,
    model_path: &Path,
    mut params: DetectionParams,
) -> Result<EngineSelection> {
    if mode == DetectionMode::Wasm {
        info!("🌐 Detección en el navegador (modo wasm)");
        return Ok(EngineSelection { engine: None, mode, params });
    }
    if !model_path.exists() {
        bail!("no se encuentra el fichero del modelo: {}", model_path.display());
    }

    match OnnxYoloEngine::load(model_path, params.input_size) {
        Ok(engine) => {
            params.input_size = engine.input_size();
            let engine: Arc<dyn InferencePort> = Arc::new(engine);
            Ok(EngineSelection { engine: Some(engine), mode, params })
        }
        Err(e) => {
            warn!("⚠️ No se pudo cargar el modelo ONNX ({}); se usa el modo wasm", e);
            Ok(EngineSelection { engine: None, mode: DetectionMode::Wasm, params })
        }
    }
}
