use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::ports::{ClockPort, MetricsSinkPort, SystemProbePort};
use crate::domain::{
    errors::{DomainError, DomainResult},
    metrics::{
        bandwidth, latency_report, mean, percentile, system_report, BenchmarkSummary,
        BoundedBuffer, FrameMetricSample, MetricsExport, MetricsSnapshot, SystemSample,
    },
};

/// Frames más recientes que entran en una exportación.
pub const EXPORT_FRAME_LIMIT: usize = 100;
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub frame_capacity: usize,
    pub system_capacity: usize,
    pub sample_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            frame_capacity: 1000,
            system_capacity: 100,
            sample_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregatorState {
    Running,
    Stopped,
}

struct Inner {
    frames: BoundedBuffer<FrameMetricSample>,
    system: BoundedBuffer<SystemSample>,
    total_frames: u64,
    total_detections: u64,
    frames_processed: u64,
    start_ms: i64,
    state: AggregatorState,
}

/// Colector de métricas: latencias por frame y muestras periódicas del sistema.
///
/// Todo el estado vive detrás de un único `Mutex`; las lecturas nunca fallan y
/// devuelven resultados vacíos sobre buffers vacíos. Tras `stop()` se ignoran
/// nuevas muestras, pero las consultas siguen funcionando.
pub struct MetricsAggregator {
    inner: Mutex<Inner>,
    config: AggregatorConfig,
    clock: Arc<dyn ClockPort>,
    sink: Arc<dyn MetricsSinkPort>,
    stop_tx: watch::Sender<bool>,
    sampler: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsAggregator {
    pub fn new(
        config: AggregatorConfig,
        clock: Arc<dyn ClockPort>,
        sink: Arc<dyn MetricsSinkPort>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let inner = Inner {
            frames: BoundedBuffer::new(config.frame_capacity),
            system: BoundedBuffer::new(config.system_capacity),
            total_frames: 0,
            total_detections: 0,
            frames_processed: 0,
            start_ms: clock.now_ms(),
            state: AggregatorState::Running,
        };
        info!("📊 Metrics collector initialized");
        Self {
            inner: Mutex::new(inner),
            config,
            clock,
            sink,
            stop_tx,
            sampler: Mutex::new(None),
        }
    }

    /// Crea el colector y arranca el muestreo del sistema. Requiere un runtime de Tokio.
    pub fn start(
        config: AggregatorConfig,
        clock: Arc<dyn ClockPort>,
        sink: Arc<dyn MetricsSinkPort>,
        probe: Arc<dyn SystemProbePort>,
    ) -> Arc<Self> {
        let aggregator = Arc::new(Self::new(config, clock, sink));
        aggregator.spawn_sampler(probe);
        aggregator
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> AggregatorState {
        self.lock().state
    }

    /// Lanza la tarea periódica de muestreo. Un fallo de lectura se registra y
    /// se salta ese tick; el bucle sigue hasta `stop()`.
    pub fn spawn_sampler(self: &Arc<Self>, probe: Arc<dyn SystemProbePort>) {
        if self.state() == AggregatorState::Stopped {
            warn!("Sampler not started: metrics collector already stopped");
            return;
        }
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if sampler.is_some() {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let mut stop_rx = self.stop_tx.subscribe();
        let period = self.config.sample_interval;

        *sampler = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                let Some(aggregator) = weak.upgrade() else { break };
                if aggregator.state() == AggregatorState::Stopped {
                    break;
                }

                let probe = probe.clone();
                let now = aggregator.clock.now_ms();
                match tokio::task::spawn_blocking(move || probe.sample(now)).await {
                    Ok(Ok(sample)) => aggregator.record_system_sample(sample),
                    Ok(Err(e)) => error!("❌ Error collecting system metrics: {}", e),
                    Err(e) => error!("❌ System sampler task failed: {}", e),
                }
            }
            debug!("System sampler exited");
        }));
    }

    /// Registra un frame procesado. Acepta timestamps desordenados: las
    /// latencias negativas se guardan tal cual.
    pub fn record_frame(
        &self,
        capture_ts: i64,
        recv_ts: i64,
        inference_ts: i64,
        num_detections: u64,
        display_ts: Option<i64>,
    ) {
        let now = self.clock.now_ms();
        let display_ts = display_ts.unwrap_or(now);
        let sample =
            FrameMetricSample::new(now, capture_ts, recv_ts, inference_ts, display_ts, num_detections);

        let mut inner = self.lock();
        if inner.state == AggregatorState::Stopped {
            debug!("Frame metric dropped: collector stopped");
            return;
        }
        let e2e = sample.end_to_end_latency;
        inner.frames.push(sample);
        inner.total_frames += 1;
        inner.total_detections += num_detections;
        inner.frames_processed += 1;

        debug!(
            "📈 Frame {}: E2E={}ms, Objects={}",
            inner.total_frames, e2e, num_detections
        );
    }

    pub fn record_system_sample(&self, sample: SystemSample) {
        let mut inner = self.lock();
        if inner.state == AggregatorState::Stopped {
            debug!("System sample dropped: collector stopped");
            return;
        }
        inner.system.push(sample);
    }

    pub fn current_metrics(&self) -> MetricsSnapshot {
        let now = self.clock.now_ms();
        snapshot(&self.lock(), now)
    }

    /// Resumen de los frames registrados en los últimos `duration_seconds`.
    pub fn benchmark_summary(&self, duration_seconds: u64) -> DomainResult<BenchmarkSummary> {
        let now = self.clock.now_ms();
        let inner = self.lock();
        if inner.frames.is_empty() {
            return Err(DomainError::NoData);
        }

        let window_ms = i64::try_from(duration_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(window_ms);
        let recent: Vec<&FrameMetricSample> =
            inner.frames.iter().filter(|f| f.timestamp >= cutoff).collect();
        if recent.is_empty() {
            return Err(DomainError::NoRecentData { window_secs: duration_seconds });
        }

        let mut e2e: Vec<f64> = recent.iter().map(|f| f.end_to_end_latency as f64).collect();
        e2e.sort_by(f64::total_cmp);
        let bw = inner.system.latest_pair().map(|(prev, latest)| bandwidth(prev, latest));

        Ok(BenchmarkSummary {
            duration_seconds,
            frames_processed: recent.len(),
            processed_fps: if duration_seconds > 0 {
                recent.len() as f64 / duration_seconds as f64
            } else {
                0.0
            },
            total_detections: recent.iter().map(|f| f.num_detections).sum(),
            median_e2e_latency_ms: percentile(&e2e, 50.0),
            p95_e2e_latency_ms: percentile(&e2e, 95.0),
            mean_e2e_latency_ms: mean(&e2e),
            uplink_kbps: bw.map(|b| b.uplink_kbps),
            downlink_kbps: bw.map(|b| b.downlink_kbps),
        })
    }

    /// Documento de exportación: resumen actual más los últimos frames
    /// (opcionalmente sólo los registrados desde `since_ms`).
    pub fn build_export(&self, since_ms: Option<i64>) -> MetricsExport {
        let export_timestamp = self.clock.now_ms();
        // resumen y frames salen del mismo guard
        let inner = self.lock();
        let summary = snapshot(&inner, export_timestamp);

        let matching: Vec<&FrameMetricSample> = inner
            .frames
            .iter()
            .filter(|f| since_ms.map_or(true, |since| f.timestamp >= since))
            .collect();
        let skip = matching.len().saturating_sub(EXPORT_FRAME_LIMIT);

        MetricsExport {
            summary,
            export_timestamp,
            frame_count: matching.len(),
            frames: matching.into_iter().skip(skip).cloned().collect(),
        }
    }

    pub async fn export_snapshot(&self, name: &str, since_ms: Option<i64>) -> DomainResult<PathBuf> {
        let export = self.build_export(since_ms);
        let path = self.sink.write(name, &export).await?;
        info!("📊 Metrics exported to {}", path.display());
        Ok(path)
    }

    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        inner.frames.clear();
        inner.system.clear();
        inner.total_frames = 0;
        inner.total_detections = 0;
        inner.frames_processed = 0;
        inner.start_ms = now;
        info!("🔄 Metrics reset");
    }

    /// Detiene el muestreo y espera (como mucho 2 s) a que la tarea termine.
    pub async fn stop(&self) {
        {
            let mut inner = self.lock();
            if inner.state == AggregatorState::Stopped {
                return;
            }
            inner.state = AggregatorState::Stopped;
        }
        self.stop_tx.send_replace(true);

        let handle = self.sampler.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!("⚠️ System sampler did not stop within {:?}", STOP_TIMEOUT);
            }
        }
        info!("🛑 Metrics collector stopped");
    }
}

fn snapshot(inner: &Inner, now: i64) -> MetricsSnapshot {
    let runtime_seconds = (now - inner.start_ms) as f64 / 1000.0;

    MetricsSnapshot {
        runtime_seconds,
        total_frames: inner.total_frames,
        total_detections: inner.total_detections,
        frames_processed: inner.frames_processed,
        processed_fps: if runtime_seconds > 0.0 {
            inner.frames_processed as f64 / runtime_seconds
        } else {
            0.0
        },
        avg_detections_per_frame: if inner.total_frames > 0 {
            inner.total_detections as f64 / inner.total_frames as f64
        } else {
            0.0
        },
        latency: latency_report(inner.frames.iter()),
        system: system_report(&inner.system),
    }
}

impl Drop for MetricsAggregator {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}
