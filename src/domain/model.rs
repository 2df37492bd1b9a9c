use ndarray::{ArrayViewD, IxDyn, ShapeError};
use serde::{Deserialize, Serialize};

/// Clases COCO, en el orden de salida de YOLOv5.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionParams {
    pub input_size: ImageSize,  // entrada del modelo, p.ej. 640x640
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            input_size: ImageSize::new(640, 640),
            conf_threshold: 0.5,
            iou_threshold: 0.4,
        }
    }
}

/// Tensor de salida (row-major) que devuelve el runtime de inferencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl RawOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn view(&self) -> Result<ArrayViewD<'_, f32>, ShapeError> {
        ArrayViewD::from_shape(IxDyn(&self.shape), &self.data)
    }
}
