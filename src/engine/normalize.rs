use serde::Serialize;

use crate::format::{bytes_to_mb, format_unix_secs};
use crate::system::source::{Baseline, RawCounterSet, RawProcess};

/// How per-process CPU percentages are scaled.
///
/// With `per_core` unset, 100% means one fully-busy logical core and a
/// multi-threaded process can exceed 100. With it set, the same figure is
/// divided by the logical core count so 100% means the whole machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizeOptions {
    pub per_core: bool,
}

/// System-wide gauges for one tick, already scaled to comparable units.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub swap_used_mb: f64,
    pub swap_total_mb: f64,
    pub disk_usage_percent: f64,
    /// Cumulative interface totals since boot, MB.
    pub network_sent_mb: f64,
    pub network_recv_mb: f64,
    /// Traffic during this sampling interval, MB.
    pub network_sent_delta_mb: f64,
    pub network_recv_delta_mb: f64,
}

/// One process's normalized metrics plus identity; compared only within the
/// tick that produced it.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub executable: Option<String>,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub memory_percent: f64,
    pub virtual_mb: f64,
    pub io_read_delta_mb: f64,
    pub io_write_delta_mb: f64,
}

/// Richer non-aggregated row for the detailed process table.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessDetail {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub name: String,
    pub executable: Option<String>,
    pub command: String,
    pub owner: Option<String>,
    pub status: String,
    pub thread_count: Option<usize>,
    /// Process start time as a readable UTC string.
    pub started_at: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub memory_percent: f64,
    pub virtual_mb: f64,
    pub io_read_total_mb: f64,
    pub io_write_total_mb: f64,
    pub io_read_delta_mb: f64,
    pub io_write_delta_mb: f64,
}

/// Per-interface counters scaled to MB, with interval deltas.
#[derive(Clone, Debug, Serialize)]
pub struct InterfaceMetrics {
    pub name: String,
    pub recv_total_mb: f64,
    pub sent_total_mb: f64,
    pub recv_delta_mb: f64,
    pub sent_delta_mb: f64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

/// All normalized views of one tick.
#[derive(Clone, Debug, Default)]
pub struct NormalizedSample {
    pub system: SystemMetrics,
    pub processes: Vec<ProcessRecord>,
    pub details: Vec<ProcessDetail>,
    pub interfaces: Vec<InterfaceMetrics>,
}

/// Convert one tick's raw counters into comparable per-sample values.
///
/// Cumulative counters are diffed against `baseline`; an absent baseline
/// entry (first tick, new process, recycled PID) yields a zero delta, and a
/// counter that appears to have gone backwards clamps to zero.
pub fn normalize(
    raw: &RawCounterSet,
    baseline: &Baseline,
    opts: NormalizeOptions,
) -> NormalizedSample {
    let system = normalize_system(raw, baseline);
    let mut processes = Vec::with_capacity(raw.processes.len());
    let mut details = Vec::with_capacity(raw.processes.len());

    for proc in &raw.processes {
        let cpu = process_cpu_percent(proc, baseline, raw.logical_cores, opts);
        let memory_mb = bytes_to_mb(proc.memory_bytes);
        let memory_percent = percent_of(proc.memory_bytes, raw.memory_total_bytes);
        let virtual_mb = bytes_to_mb(proc.virtual_bytes);

        let (read_delta, write_delta) = match baseline.process(proc.pid, proc.start_time_secs) {
            Some(prev) => (
                proc.io_read_bytes.saturating_sub(prev.io_read_bytes),
                proc.io_written_bytes.saturating_sub(prev.io_written_bytes),
            ),
            None => (0, 0),
        };
        let io_read_delta_mb = bytes_to_mb(read_delta);
        let io_write_delta_mb = bytes_to_mb(write_delta);

        processes.push(ProcessRecord {
            pid: proc.pid,
            name: proc.name.clone(),
            executable: proc.exe.clone(),
            cpu_percent: cpu,
            memory_mb,
            memory_percent,
            virtual_mb,
            io_read_delta_mb,
            io_write_delta_mb,
        });

        details.push(ProcessDetail {
            pid: proc.pid,
            parent_pid: proc.parent_pid,
            name: proc.name.clone(),
            executable: proc.exe.clone(),
            command: proc.command.clone(),
            owner: proc.user_id.clone(),
            status: proc.status.clone(),
            thread_count: proc.thread_count,
            started_at: format_unix_secs(proc.start_time_secs),
            cpu_percent: cpu,
            memory_mb,
            memory_percent,
            virtual_mb,
            io_read_total_mb: bytes_to_mb(proc.io_read_bytes),
            io_write_total_mb: bytes_to_mb(proc.io_written_bytes),
            io_read_delta_mb,
            io_write_delta_mb,
        });
    }

    let interfaces = normalize_interfaces(raw, baseline);

    NormalizedSample {
        system,
        processes,
        details,
        interfaces,
    }
}

fn normalize_system(raw: &RawCounterSet, baseline: &Baseline) -> SystemMetrics {
    let disk_usage_percent = match raw.disk {
        Some(disk) if disk.total_bytes > 0 => {
            let used = disk.total_bytes.saturating_sub(disk.available_bytes);
            percent_of(used, disk.total_bytes)
        }
        _ => 0.0,
    };

    let (sent_total, recv_total, sent_delta, recv_delta) = match raw.network {
        Some(now) => {
            let (sent_d, recv_d) = match baseline.network {
                Some(prev) => (
                    now.tx_bytes.saturating_sub(prev.tx_bytes),
                    now.rx_bytes.saturating_sub(prev.rx_bytes),
                ),
                None => (0, 0),
            };
            (now.tx_bytes, now.rx_bytes, sent_d, recv_d)
        }
        None => (0, 0, 0, 0),
    };

    SystemMetrics {
        cpu_usage_percent: raw.cpu_total_percent as f64,
        memory_usage_percent: percent_of(raw.memory_used_bytes, raw.memory_total_bytes),
        memory_used_mb: bytes_to_mb(raw.memory_used_bytes),
        memory_total_mb: bytes_to_mb(raw.memory_total_bytes),
        swap_used_mb: bytes_to_mb(raw.swap_used_bytes),
        swap_total_mb: bytes_to_mb(raw.swap_total_bytes),
        disk_usage_percent,
        network_sent_mb: bytes_to_mb(sent_total),
        network_recv_mb: bytes_to_mb(recv_total),
        network_sent_delta_mb: bytes_to_mb(sent_delta),
        network_recv_delta_mb: bytes_to_mb(recv_delta),
    }
}

fn normalize_interfaces(raw: &RawCounterSet, baseline: &Baseline) -> Vec<InterfaceMetrics> {
    raw.interfaces
        .iter()
        .map(|iface| {
            let (recv_delta, sent_delta) = match baseline.interfaces.get(&iface.name) {
                Some(prev) => (
                    iface.totals.rx_bytes.saturating_sub(prev.rx_bytes),
                    iface.totals.tx_bytes.saturating_sub(prev.tx_bytes),
                ),
                None => (0, 0),
            };
            InterfaceMetrics {
                name: iface.name.clone(),
                recv_total_mb: bytes_to_mb(iface.totals.rx_bytes),
                sent_total_mb: bytes_to_mb(iface.totals.tx_bytes),
                recv_delta_mb: bytes_to_mb(recv_delta),
                sent_delta_mb: bytes_to_mb(sent_delta),
                rx_packets: iface.totals.rx_packets,
                tx_packets: iface.totals.tx_packets,
            }
        })
        .collect()
}

fn process_cpu_percent(
    proc: &RawProcess,
    baseline: &Baseline,
    logical_cores: usize,
    opts: NormalizeOptions,
) -> f64 {
    if baseline.interval_secs <= 0.0 {
        return 0.0;
    }
    let Some(prev) = baseline.process(proc.pid, proc.start_time_secs) else {
        return 0.0;
    };

    let cores = logical_cores.max(1) as f64;
    let busy_ms = proc.cpu_time_ms.saturating_sub(prev.cpu_time_ms) as f64;
    let percent = (busy_ms / (baseline.interval_secs * 1000.0) * 100.0).clamp(0.0, 100.0 * cores);
    if opts.per_core {
        percent / cores
    } else {
        percent
    }
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
