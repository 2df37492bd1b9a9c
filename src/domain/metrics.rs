use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Tiempos de un frame procesado. Todos los timestamps en ms desde epoch.
///
/// Las latencias son diferencias (saturadas en los extremos de `i64`) y salen
/// negativas si los relojes de cliente y servidor no coinciden; aquí no se corrige el desfase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetricSample {
    /// Hora del servidor en que se registró la muestra.
    pub timestamp: i64,
    pub capture_ts: i64,
    pub recv_ts: i64,
    pub inference_ts: i64,
    pub display_ts: i64,
    pub network_latency: i64,
    pub server_latency: i64,
    pub end_to_end_latency: i64,
    pub num_detections: u64,
}

impl FrameMetricSample {
    pub fn new(
        timestamp: i64,
        capture_ts: i64,
        recv_ts: i64,
        inference_ts: i64,
        display_ts: i64,
        num_detections: u64,
    ) -> Self {
        Self {
            timestamp,
            capture_ts,
            recv_ts,
            inference_ts,
            display_ts,
            network_latency: recv_ts.saturating_sub(capture_ts),
            server_latency: inference_ts.saturating_sub(recv_ts),
            end_to_end_latency: display_ts.saturating_sub(capture_ts),
            num_detections,
        }
    }
}

/// Muestra periódica de recursos. Los bytes de red son acumulados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    pub timestamp: i64,
    pub process_cpu_percent: f64,
    pub system_cpu_percent: f64,
    pub memory_rss: u64,
    pub memory_vms: u64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// FIFO de capacidad fija; al llenarse se descarta la entrada más antigua.
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + Clone + '_ {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// La entrada más nueva y la anterior.
    pub fn latest_pair(&self) -> Option<(&T, &T)> {
        let n = self.items.len();
        if n < 2 {
            return None;
        }
        Some((&self.items[n - 2], &self.items[n - 1]))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndToEndStats {
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub median: f64,
    pub p95: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    pub end_to_end: EndToEndStats,
    pub network: LatencyStats,
    pub server: LatencyStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub uplink_kbps: f64,
    pub downlink_kbps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub process_cpu_percent: f64,
    pub system_cpu_percent: f64,
    pub memory_mb: f64,
    pub uplink_kbps: f64,
    pub downlink_kbps: f64,
}

/// Vista en vivo calculada a demanda desde los buffers del colector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub runtime_seconds: f64,
    pub total_frames: u64,
    pub total_detections: u64,
    pub frames_processed: u64,
    pub processed_fps: f64,
    pub avg_detections_per_frame: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub duration_seconds: u64,
    pub frames_processed: usize,
    pub processed_fps: f64,
    pub total_detections: u64,
    pub median_e2e_latency_ms: f64,
    pub p95_e2e_latency_ms: f64,
    pub mean_e2e_latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink_kbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downlink_kbps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsExport {
    pub summary: MetricsSnapshot,
    pub export_timestamp: i64,
    pub frame_count: usize,
    pub frames: Vec<FrameMetricSample>,
}

/// Percentil con interpolación lineal sobre un slice ascendente. `p` en `0..=100`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = idx - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sorted(values: impl Iterator<Item = i64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.map(|x| x as f64).collect();
    v.sort_by(f64::total_cmp);
    v
}

fn latency_stats(sorted: &[f64]) -> LatencyStats {
    LatencyStats {
        median: percentile(sorted, 50.0),
        p95: percentile(sorted, 95.0),
        mean: mean(sorted),
    }
}

/// `None` si no hay frames.
pub fn latency_report<'a>(
    frames: impl Iterator<Item = &'a FrameMetricSample> + Clone,
) -> Option<LatencyReport> {
    let e2e = sorted(frames.clone().map(|f| f.end_to_end_latency));
    if e2e.is_empty() {
        return None;
    }
    let network = sorted(frames.clone().map(|f| f.network_latency));
    let server = sorted(frames.map(|f| f.server_latency));

    Some(LatencyReport {
        end_to_end: EndToEndStats {
            median: percentile(&e2e, 50.0),
            p95: percentile(&e2e, 95.0),
            p99: percentile(&e2e, 99.0),
            mean: mean(&e2e),
            min: e2e[0],
            max: e2e[e2e.len() - 1],
        },
        network: latency_stats(&network),
        server: latency_stats(&server),
    })
}

/// Caudal entre dos lecturas de contadores acumulados, en kilobits por segundo.
pub fn bandwidth(prev: &SystemSample, latest: &SystemSample) -> Bandwidth {
    let dt_secs = (latest.timestamp - prev.timestamp) as f64 / 1000.0;
    if dt_secs <= 0.0 {
        return Bandwidth::default();
    }
    let sent = latest.bytes_sent as f64 - prev.bytes_sent as f64;
    let recv = latest.bytes_recv as f64 - prev.bytes_recv as f64;
    Bandwidth {
        uplink_kbps: (sent * 8.0 / dt_secs) / 1000.0,
        downlink_kbps: (recv * 8.0 / dt_secs) / 1000.0,
    }
}

pub fn system_report(samples: &BoundedBuffer<SystemSample>) -> Option<SystemReport> {
    let latest = samples.latest()?;
    let bw = samples
        .latest_pair()
        .map(|(prev, latest)| bandwidth(prev, latest))
        .unwrap_or_default();
    Some(SystemReport {
        process_cpu_percent: latest.process_cpu_percent,
        system_cpu_percent: latest.system_cpu_percent,
        memory_mb: latest.memory_rss as f64 / (1024.0 * 1024.0),
        uplink_kbps: bw.uplink_kbps,
        downlink_kbps: bw.downlink_kbps,
    })
}
