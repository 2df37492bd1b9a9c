use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rtc_detect_server::{
    adapters::{
        export::json_file::JsonFileSink,
        http::{app, state::HttpState},
        onnx::yolo_engine::select_engine,
        system::{clock::SystemClock, procfs_probe::ProcfsProbe},
    },
    application::{
        dto::ClientConfig,
        metrics_service::MetricsAggregator,
        services::FramePipelineService,
    },
    config::ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ServerConfig::parse();

    // 1. Inicializar logs (RUST_LOG manda; si no, info o debug con --debug)
    let default_level = if cfg.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Adaptadores: reloj, sumidero de exportación y sonda del sistema
    let clock = Arc::new(SystemClock::new());
    let sink = Arc::new(JsonFileSink::new(&cfg.metrics_dir));
    let probe = Arc::new(ProcfsProbe::new());

    // 3. Motor de inferencia sólo en modo servidor; sin fichero de modelo no arrancamos
    let selection = select_engine(cfg.mode, &cfg.model_path, cfg.detection_params())?;
    let client = ClientConfig::new(
        selection.mode,
        &selection.params,
        cfg.detection_interval,
        cfg.max_detections,
    );

    // 4. Servicios (capa de aplicación)
    let metrics = MetricsAggregator::start(cfg.aggregator_config(), clock.clone(), sink, probe);
    let pipeline = Arc::new(FramePipelineService::new(
        selection.engine,
        selection.params,
        metrics.clone(),
        clock,
    ));

    // 5. Estado de la API y router con archivos estáticos
    let state = HttpState {
        pipeline,
        metrics: metrics.clone(),
        client: Arc::new(client),
    };
    let router = app(state, &cfg.static_dir, &cfg.models_dir);

    // 6. Lanzar el servidor
    let addr = cfg.bind_addr();
    tracing::info!("🚀 Servidor de detección iniciado en http://{}", addr);
    tracing::info!("📂 Archivos estáticos servidos desde '{}'", cfg.static_dir.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7. Parar el muestreo antes de salir
    metrics.stop().await;
    tracing::info!("👋 Servidor detenido");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ No se pudo escuchar Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Señal de parada recibida");
}
