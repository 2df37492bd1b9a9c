use async_trait::async_trait;
use image::RgbImage;
use std::path::PathBuf;

use crate::domain::{
    errors::DomainResult,
    metrics::{MetricsExport, SystemSample},
    model::RawOutput,
};

/// Runtime de inferencia: entra un frame, sale el tensor crudo.
/// Es bloqueante; quien llama lo saca del executor async.
pub trait InferencePort: Send + Sync {
    fn infer(&self, image: &RgbImage) -> DomainResult<RawOutput>;
}

/// Fuente de muestras periódicas de recursos del proceso y del host.
pub trait SystemProbePort: Send + Sync {
    fn sample(&self, now_ms: i64) -> DomainResult<SystemSample>;
}

/// Destino persistente de las exportaciones de métricas, por nombre.
#[async_trait]
pub trait MetricsSinkPort: Send + Sync {
    async fn write(&self, name: &str, export: &MetricsExport) -> DomainResult<PathBuf>;
}

/// Reloj de pared en milisegundos desde epoch.
pub trait ClockPort: Send + Sync {
    fn now_ms(&self) -> i64;
}
