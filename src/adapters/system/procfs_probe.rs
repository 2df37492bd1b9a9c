use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::application::ports::SystemProbePort;
use crate::domain::{
    errors::{DomainError, DomainResult},
    metrics::SystemSample,
};

#[derive(Debug, Clone, Copy)]
struct CpuReading {
    at_ms: i64,
    process_ticks: u64,
    total_ticks: u64,
    idle_ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HostCpu {
    total: u64,
    idle: u64,
}

/// Lee CPU, memoria y contadores de red desde `/proc`.
///
/// Los porcentajes de CPU se calculan como delta entre dos lecturas
/// consecutivas, así que la primera muestra informa 0 %.
pub struct ProcfsProbe {
    root: PathBuf,
    clk_tck: f64,
    prev: Mutex<Option<CpuReading>>,
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clk_tck: clk_tck(),
            prev: Mutex::new(None),
        }
    }

    fn read(&self, rel: &str) -> DomainResult<String> {
        let path = self.root.join(rel);
        std::fs::read_to_string(&path)
            .map_err(|e| DomainError::SampleFailed(format!("{}: {}", path.display(), e)))
    }
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbePort for ProcfsProbe {
    fn sample(&self, now_ms: i64) -> DomainResult<SystemSample> {
        let process_ticks = parse_process_ticks(&self.read("self/stat")?)
            .ok_or_else(|| malformed("self/stat"))?;
        let host = parse_host_cpu(&self.read("stat")?).ok_or_else(|| malformed("stat"))?;
        let (memory_rss, memory_vms) =
            parse_memory(&self.read("self/status")?).ok_or_else(|| malformed("self/status"))?;
        let (bytes_recv, bytes_sent) = parse_net_dev(&self.read("net/dev")?);

        let current = CpuReading {
            at_ms: now_ms,
            process_ticks,
            total_ticks: host.total,
            idle_ticks: host.idle,
        };
        let previous = self
            .prev
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(current);
        let (process_cpu_percent, system_cpu_percent) = match previous {
            Some(prev) => cpu_percentages(&prev, &current, self.clk_tck),
            None => (0.0, 0.0),
        };

        Ok(SystemSample {
            timestamp: now_ms,
            process_cpu_percent,
            system_cpu_percent,
            memory_rss,
            memory_vms,
            bytes_sent,
            bytes_recv,
        })
    }
}

fn malformed(file: &str) -> DomainError {
    DomainError::SampleFailed(format!("formato inesperado en {}", file))
}

#[cfg(target_os = "linux")]
fn clk_tck() -> f64 {
    // SAFETY: sysconf no tiene efectos secundarios para esta consulta.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as f64
    } else {
        100.0
    }
}

#[cfg(not(target_os = "linux"))]
fn clk_tck() -> f64 {
    100.0
}

fn cpu_percentages(prev: &CpuReading, current: &CpuReading, clk_tck: f64) -> (f64, f64) {
    let wall_secs = (current.at_ms - prev.at_ms) as f64 / 1000.0;
    let process = if wall_secs > 0.0 {
        let cpu_secs = current.process_ticks.saturating_sub(prev.process_ticks) as f64 / clk_tck;
        cpu_secs / wall_secs * 100.0
    } else {
        0.0
    };

    let total = current.total_ticks.saturating_sub(prev.total_ticks);
    let idle = current.idle_ticks.saturating_sub(prev.idle_ticks);
    let system = if total > 0 {
        (1.0 - idle as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    (process, system)
}

/// utime + stime de `/proc/<pid>/stat`.
fn parse_process_ticks(stat: &str) -> Option<u64> {
    // comm puede tener espacios y paréntesis; los campos siguen tras el último ')'
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime = fields.get(11)?.parse::<u64>().ok()?;
    let stime = fields.get(12)?.parse::<u64>().ok()?;
    Some(utime + stime)
}

fn parse_host_cpu(stat: &str) -> Option<HostCpu> {
    let line = stat.lines().find_map(|l| l.strip_prefix("cpu "))?;
    let parts: Vec<u64> = line
        .split_whitespace()
        .filter_map(|s| s.parse::<u64>().ok())
        .collect();
    if parts.len() < 4 {
        return None;
    }
    // el tiempo guest ya va incluido en user/nice
    let total = parts.iter().take(8).sum();
    let idle = parts[3] + parts.get(4).copied().unwrap_or(0);
    Some(HostCpu { total, idle })
}

/// (VmRSS, VmSize) en bytes de `/proc/<pid>/status`.
fn parse_memory(status: &str) -> Option<(u64, u64)> {
    let kb = |key: &str| -> Option<u64> {
        status
            .lines()
            .find_map(|l| l.strip_prefix(key))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v * 1024)
    };
    Some((kb("VmRSS:")?, kb("VmSize:")?))
}

/// Bytes (recibidos, enviados) sumados sobre todas las interfaces.
fn parse_net_dev(raw: &str) -> (u64, u64) {
    let mut rx = 0;
    let mut tx = 0;
    for line in raw.lines().skip(2) {
        let Some((_, stats)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<u64> = stats
            .split_whitespace()
            .filter_map(|s| s.parse::<u64>().ok())
            .collect();
        if fields.len() < 16 {
            continue;
        }
        rx += fields[0];
        tx += fields[8];
    }
    (rx, tx)
}
