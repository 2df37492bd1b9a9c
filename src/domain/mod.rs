pub mod decode;
pub mod detection;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod stream;
pub mod suppression;
