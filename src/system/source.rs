use std::collections::HashMap;
use std::time::Instant;

use sysinfo::{Disks, Networks, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use thiserror::Error;

/// A whole subsystem (disk stats, network list) could not be queried this
/// tick. The affected snapshot section is emitted zeroed and the tick
/// continues; per-process read failures never surface as this type, the
/// process is simply absent from the sample.
#[derive(Clone, Debug, Error)]
pub enum SourceError {
    #[error("{subsystem} counters unavailable: {reason}")]
    SubsystemUnavailable {
        subsystem: &'static str,
        reason: String,
    },
}

impl SourceError {
    pub fn subsystem(&self) -> &'static str {
        match self {
            SourceError::SubsystemUnavailable { subsystem, .. } => subsystem,
        }
    }
}

/// One process as reported by the OS, cumulative counters included.
#[derive(Clone, Debug, Default)]
pub struct RawProcess {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub name: String,
    /// Full executable path when readable; `None` typically means access
    /// denied, in which case aggregation falls back to `name`.
    pub exe: Option<String>,
    pub command: String,
    /// Cumulative busy time in milliseconds since process start.
    pub cpu_time_ms: u64,
    pub memory_bytes: u64,
    pub virtual_bytes: u64,
    /// Cumulative bytes read/written since process start.
    pub io_read_bytes: u64,
    pub io_written_bytes: u64,
    pub thread_count: Option<usize>,
    pub start_time_secs: u64,
    pub status: String,
    pub user_id: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetTotals {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

#[derive(Clone, Debug)]
pub struct InterfaceCounters {
    pub name: String,
    pub totals: NetTotals,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiskTotals {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Everything the OS reports at one instant. Built fresh each tick and never
/// mutated after capture. `disk`/`network` are `None` when that subsystem
/// failed to read (see [`SourceError`]).
#[derive(Clone, Debug, Default)]
pub struct RawCounterSet {
    pub cpu_total_percent: f32,
    pub logical_cores: usize,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub disk: Option<DiskTotals>,
    pub network: Option<NetTotals>,
    pub interfaces: Vec<InterfaceCounters>,
    pub processes: Vec<RawProcess>,
}

/// Previous-tick cumulative counters for one process. `start_time_secs` is
/// the PID-reuse guard: if it does not match the current reading the PID was
/// recycled and the baseline must not be applied.
#[derive(Clone, Copy, Debug)]
pub struct ProcBaseline {
    pub cpu_time_ms: u64,
    pub io_read_bytes: u64,
    pub io_written_bytes: u64,
    pub start_time_secs: u64,
}

/// Delta baseline retained by the counter source between ticks. The first
/// tick carries an empty baseline (`interval_secs == 0.0`), which the
/// normalizer turns into all-zero deltas. Constructed directly in tests to
/// seed arbitrary previous values.
#[derive(Clone, Debug, Default)]
pub struct Baseline {
    /// Wall-clock seconds since the previous sample; 0.0 on the first tick.
    pub interval_secs: f64,
    pub network: Option<NetTotals>,
    pub interfaces: HashMap<String, NetTotals>,
    pub processes: HashMap<u32, ProcBaseline>,
}

impl Baseline {
    /// Previous counters for `pid`, only if the baseline still describes the
    /// same process instance.
    pub fn process(&self, pid: u32, start_time_secs: u64) -> Option<&ProcBaseline> {
        self.processes
            .get(&pid)
            .filter(|b| b.start_time_secs == start_time_secs)
    }

    /// Snapshot the cumulative counters of `raw` as the baseline for the
    /// next tick.
    pub fn next_from(raw: &RawCounterSet) -> Self {
        let processes = raw
            .processes
            .iter()
            .map(|p| {
                (
                    p.pid,
                    ProcBaseline {
                        cpu_time_ms: p.cpu_time_ms,
                        io_read_bytes: p.io_read_bytes,
                        io_written_bytes: p.io_written_bytes,
                        start_time_secs: p.start_time_secs,
                    },
                )
            })
            .collect();
        let interfaces = raw
            .interfaces
            .iter()
            .map(|iface| (iface.name.clone(), iface.totals))
            .collect();
        Baseline {
            interval_secs: 0.0,
            network: raw.network,
            interfaces,
            processes,
        }
    }
}

/// One tick's read: the fresh counters, the baseline they should be diffed
/// against, and any whole-subsystem failures encountered on the way.
#[derive(Clone, Debug, Default)]
pub struct Sample {
    pub raw: RawCounterSet,
    pub baseline: Baseline,
    pub failures: Vec<SourceError>,
}

/// Read-only view of the OS consumed once per tick. The implementation owns
/// whatever delta state it needs between ticks; `sample` must never be
/// called concurrently with itself (the sampler loop guarantees a single
/// timeline).
pub trait CounterSource {
    fn sample(&mut self) -> Sample;
}

/// Production source backed by `sysinfo`.
pub struct SysinfoSource {
    sys: System,
    networks: Networks,
    disks: Disks,
    baseline: Baseline,
    last_sample: Option<Instant>,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    /// Primes an initial refresh so the first tick's OS-computed CPU figures
    /// have a reference point.
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        let networks = Networks::new_with_refreshed_list();
        let disks = Disks::new_with_refreshed_list();
        SysinfoSource {
            sys,
            networks,
            disks,
            baseline: Baseline::default(),
            last_sample: None,
        }
    }

    fn read_counters(&mut self, failures: &mut Vec<SourceError>) -> RawCounterSet {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_all();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            // exe and cmd are fixed at exec time, so OnlyIfNotSet fetches
            // them once per process, including ones spawned after startup.
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_cpu()
                .with_disk_usage()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_tasks(),
        );
        self.networks.refresh(true);
        self.disks.refresh(true);

        let interfaces: Vec<InterfaceCounters> = self
            .networks
            .iter()
            .map(|(name, data)| InterfaceCounters {
                name: name.clone(),
                totals: NetTotals {
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                    rx_packets: data.total_packets_received(),
                    tx_packets: data.total_packets_transmitted(),
                },
            })
            .collect();

        let network = if interfaces.is_empty() {
            failures.push(SourceError::SubsystemUnavailable {
                subsystem: "network",
                reason: "no network interfaces reported".to_string(),
            });
            None
        } else {
            let mut totals = NetTotals::default();
            for iface in &interfaces {
                totals.rx_bytes += iface.totals.rx_bytes;
                totals.tx_bytes += iface.totals.tx_bytes;
                totals.rx_packets += iface.totals.rx_packets;
                totals.tx_packets += iface.totals.tx_packets;
            }
            Some(totals)
        };

        let disk = match root_disk_totals(&self.disks) {
            Some(totals) => Some(totals),
            None => {
                failures.push(SourceError::SubsystemUnavailable {
                    subsystem: "disk",
                    reason: "no disks reported".to_string(),
                });
                None
            }
        };

        let mut processes = Vec::with_capacity(self.sys.processes().len());
        for (pid, process) in self.sys.processes() {
            // Processes that vanished or became unreadable between the
            // listing and the refresh are already gone from this table;
            // whatever remains is complete.
            let disk_usage = process.disk_usage();
            processes.push(RawProcess {
                pid: pid.as_u32(),
                parent_pid: process.parent().map(|p| p.as_u32()),
                name: process.name().to_string_lossy().to_string(),
                exe: process
                    .exe()
                    .map(|path| path.to_string_lossy().to_string()),
                command: process
                    .cmd()
                    .iter()
                    .map(|s| s.to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
                cpu_time_ms: process.accumulated_cpu_time(),
                memory_bytes: process.memory(),
                virtual_bytes: process.virtual_memory(),
                io_read_bytes: disk_usage.total_read_bytes,
                io_written_bytes: disk_usage.total_written_bytes,
                thread_count: thread_count(process),
                start_time_secs: process.start_time(),
                status: format!("{:?}", process.status()),
                user_id: process.user_id().map(|uid| format!("{uid:?}")),
            });
        }

        RawCounterSet {
            cpu_total_percent: self.sys.global_cpu_usage(),
            logical_cores: self.sys.cpus().len(),
            memory_total_bytes: self.sys.total_memory(),
            memory_used_bytes: self.sys.used_memory(),
            swap_total_bytes: self.sys.total_swap(),
            swap_used_bytes: self.sys.used_swap(),
            disk,
            network,
            interfaces,
            processes,
        }
    }
}

impl CounterSource for SysinfoSource {
    fn sample(&mut self) -> Sample {
        let mut failures = Vec::new();
        let raw = self.read_counters(&mut failures);

        let now = Instant::now();
        let mut baseline = std::mem::take(&mut self.baseline);
        baseline.interval_secs = match self.last_sample {
            Some(prev) => now.duration_since(prev).as_secs_f64(),
            None => 0.0,
        };

        // Baseline swap happens only after a successful read, so a failed
        // subsystem never poisons the next tick's deltas.
        self.baseline = Baseline::next_from(&raw);
        self.last_sample = Some(now);

        Sample {
            raw,
            baseline,
            failures,
        }
    }
}

fn root_disk_totals(disks: &Disks) -> Option<DiskTotals> {
    let list = disks.list();
    let root = list
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .or_else(|| list.iter().max_by_key(|d| d.total_space()))?;
    Some(DiskTotals {
        total_bytes: root.total_space(),
        available_bytes: root.available_space(),
    })
}

#[cfg(target_os = "linux")]
fn thread_count(process: &sysinfo::Process) -> Option<usize> {
    process.tasks().map(|t| t.len())
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_process: &sysinfo::Process) -> Option<usize> {
    None
}
