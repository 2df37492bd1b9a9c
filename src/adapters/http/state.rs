use std::sync::Arc;

use crate::application::{
    dto::ClientConfig, metrics_service::MetricsAggregator, services::FramePipelineService,
};

/// Estado compartido para los manejadores HTTP de Axum.
#[derive(Clone)]
pub struct HttpState {
    /// Pipeline por frame: inferencia, NMS y registro de métricas.
    pub pipeline: Arc<FramePipelineService>,
    /// Colector de métricas compartido con el pipeline.
    pub metrics: Arc<MetricsAggregator>,
    pub client: Arc<ClientConfig>,
}
