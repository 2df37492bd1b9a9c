use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entrada mal formada: {0}")]
    MalformedInput(String),
    #[error("No hay métricas disponibles")]
    NoData,
    #[error("No hay métricas en los últimos {window_secs} segundos")]
    NoRecentData { window_secs: u64 },
    #[error("Fallo al muestrear el sistema: {0}")]
    SampleFailed(String),
    #[error("Error de exportación: {0}")]
    Export(String),
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    #[error("Error de operación: {0}")]
    OperationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
