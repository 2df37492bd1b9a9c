use async_trait::async_trait;
use std::path::PathBuf;

use crate::application::ports::MetricsSinkPort;
use crate::domain::{
    errors::{DomainError, DomainResult},
    metrics::MetricsExport,
};

/// Escribe cada exportación como JSON legible dentro de un directorio fijo.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Sólo se aceptan nombres de fichero simples; se rechaza todo lo que pueda salir del directorio.
fn validate_name(name: &str) -> DomainResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
    {
        return Err(DomainError::InvalidInput(format!("nombre de exportación inválido: {:?}", name)));
    }
    Ok(())
}

#[async_trait]
impl MetricsSinkPort for JsonFileSink {
    async fn write(&self, name: &str, export: &MetricsExport) -> DomainResult<PathBuf> {
        validate_name(name)?;
        let path = self.dir.join(name.trim());

        let body = serde_json::to_vec_pretty(export)
            .map_err(|e| DomainError::Export(format!("serialización: {}", e)))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DomainError::Export(format!("{}: {}", self.dir.display(), e)))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| DomainError::Export(format!("{}: {}", path.display(), e)))?;

        Ok(path)
    }
}
