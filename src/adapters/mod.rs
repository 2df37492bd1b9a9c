pub mod export;
pub mod http;
pub mod onnx;
pub mod system;
