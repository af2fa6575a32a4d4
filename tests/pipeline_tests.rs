//! End-to-end tick tests over a scripted counter source and an in-memory
//! sink: no OS access, fully deterministic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ticktop::engine::normalize::NormalizeOptions;
use ticktop::engine::snapshot::{AssembleOptions, Snapshot};
use ticktop::errorlog::ErrorLog;
use ticktop::sampler::Sampler;
use ticktop::sink::{Sink, SinkError};
use ticktop::system::source::{
    Baseline, CounterSource, ProcBaseline, RawCounterSet, RawProcess, Sample, SourceError,
};

fn raw_process(pid: u32, exe: Option<&str>, name: &str, cpu_time_ms: u64) -> RawProcess {
    RawProcess {
        pid,
        name: name.to_string(),
        exe: exe.map(str::to_string),
        cpu_time_ms,
        memory_bytes: 10 * 1024 * 1024,
        start_time_secs: 1_000,
        ..RawProcess::default()
    }
}

fn seeded_baseline(entries: &[(u32, u64)]) -> Baseline {
    let processes: HashMap<u32, ProcBaseline> = entries
        .iter()
        .map(|&(pid, cpu_time_ms)| {
            (
                pid,
                ProcBaseline {
                    cpu_time_ms,
                    io_read_bytes: 0,
                    io_written_bytes: 0,
                    start_time_secs: 1_000,
                },
            )
        })
        .collect();
    Baseline {
        interval_secs: 10.0,
        network: None,
        interfaces: HashMap::new(),
        processes,
    }
}

/// Plays back pre-built samples, one per tick.
struct ScriptedSource {
    samples: Vec<Sample>,
}

impl CounterSource for ScriptedSource {
    fn sample(&mut self) -> Sample {
        self.samples.remove(0)
    }
}

#[derive(Clone, Default)]
struct MemorySink {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl Sink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

struct FailingSink;

impl Sink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn append(&mut self, _snapshot: &Snapshot) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::other("disk full")))
    }
}

fn error_log_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("ticktop_pipeline_{tag}.log"))
}

fn test_error_log(tag: &str) -> ErrorLog {
    let path = error_log_path(tag);
    let _ = std::fs::remove_file(&path);
    ErrorLog::open(&path).unwrap()
}

fn sampler_for(samples: Vec<Sample>, sink: MemorySink, tag: &str) -> Sampler {
    Sampler::new(
        Box::new(ScriptedSource { samples }),
        vec![Box::new(sink)],
        NormalizeOptions::default(),
        AssembleOptions {
            top_n: 3,
            detail_top_n: 5,
        },
        test_error_log(tag),
        Duration::from_secs(5),
    )
}

#[test]
fn ranked_set_is_bounded_sorted_and_stable() {
    // CPU deltas over 10 s: pids 1..4 burn 10%, 10%, 30%, 20% of a core.
    let raw = RawCounterSet {
        logical_cores: 4,
        memory_total_bytes: 1024 * 1024 * 1024,
        processes: vec![
            raw_process(1, Some("/bin/a"), "a", 11_000),
            raw_process(2, Some("/bin/b"), "b", 11_000),
            raw_process(3, Some("/bin/c"), "c", 13_000),
            raw_process(4, Some("/bin/d"), "d", 12_000),
        ],
        ..RawCounterSet::default()
    };
    let sample = Sample {
        raw,
        baseline: seeded_baseline(&[(1, 10_000), (2, 10_000), (3, 10_000), (4, 10_000)]),
        failures: Vec::new(),
    };

    let snapshot = sampler_for(vec![sample], MemorySink::default(), "ranked").tick();

    assert!(snapshot.top_aggregated.len() <= 3);
    let cpus: Vec<f64> = snapshot
        .top_aggregated
        .iter()
        .map(|r| r.cpu_percent)
        .collect();
    for (got, want) in cpus.iter().zip([30.0, 20.0, 10.0]) {
        assert!((got - want).abs() < 1e-9, "ranking {cpus:?}");
    }
    // The two 10% candidates tie; the earlier one (pid 1, /bin/a) wins the
    // last slot by input order.
    assert_eq!(snapshot.top_aggregated[2].executable, "/bin/a");
}

#[test]
fn process_pools_aggregate_into_one_row() {
    // Two workers of the same binary: 5% and 7% of a core.
    let raw = RawCounterSet {
        logical_cores: 2,
        memory_total_bytes: 1024 * 1024 * 1024,
        processes: vec![
            raw_process(1, Some("/usr/bin/worker"), "worker", 10_500),
            raw_process(2, Some("/usr/bin/worker"), "worker", 10_700),
        ],
        ..RawCounterSet::default()
    };
    let sample = Sample {
        raw,
        baseline: seeded_baseline(&[(1, 10_000), (2, 10_000)]),
        failures: Vec::new(),
    };

    let snapshot = sampler_for(vec![sample], MemorySink::default(), "pool").tick();

    assert_eq!(snapshot.top_aggregated.len(), 1);
    let row = &snapshot.top_aggregated[0];
    assert_eq!(row.executable, "/usr/bin/worker");
    assert!((row.cpu_percent - 12.0).abs() < 1e-9);
    assert_eq!(row.instance_count, 2);
}

#[test]
fn vanished_process_is_absent_without_affecting_others() {
    // Pid 2 was listed last tick but vanished before the detail read: the
    // source simply omits it. Pid 1 keeps its metrics.
    let raw = RawCounterSet {
        logical_cores: 1,
        memory_total_bytes: 1024 * 1024 * 1024,
        processes: vec![raw_process(1, Some("/bin/a"), "a", 12_000)],
        ..RawCounterSet::default()
    };
    let sample = Sample {
        raw,
        baseline: seeded_baseline(&[(1, 10_000), (2, 50_000)]),
        failures: Vec::new(),
    };

    let snapshot = sampler_for(vec![sample], MemorySink::default(), "vanish").tick();

    assert_eq!(snapshot.processes.len(), 1);
    assert_eq!(snapshot.processes[0].pid, 1);
    assert!((snapshot.processes[0].cpu_percent - 20.0).abs() < 1e-9);
}

#[test]
fn first_tick_has_zero_deltas() {
    let raw = RawCounterSet {
        logical_cores: 1,
        memory_total_bytes: 1024 * 1024 * 1024,
        processes: vec![raw_process(1, Some("/bin/a"), "a", 900_000_000)],
        ..RawCounterSet::default()
    };
    let sample = Sample {
        raw,
        baseline: Baseline::default(),
        failures: Vec::new(),
    };

    let snapshot = sampler_for(vec![sample], MemorySink::default(), "first").tick();

    assert_eq!(snapshot.processes[0].cpu_percent, 0.0);
    assert_eq!(snapshot.system.network_recv_delta_mb, 0.0);
}

#[test]
fn sink_failure_does_not_abort_the_tick() {
    let raw = RawCounterSet {
        logical_cores: 1,
        memory_total_bytes: 1024 * 1024 * 1024,
        processes: vec![raw_process(1, Some("/bin/a"), "a", 0)],
        ..RawCounterSet::default()
    };
    let sample = Sample {
        raw,
        baseline: Baseline::default(),
        failures: Vec::new(),
    };

    let memory = MemorySink::default();
    let received = memory.snapshots.clone();
    let mut sampler = Sampler::new(
        Box::new(ScriptedSource {
            samples: vec![sample],
        }),
        vec![Box::new(FailingSink), Box::new(memory)],
        NormalizeOptions::default(),
        AssembleOptions::default(),
        test_error_log("sinkfail"),
        Duration::from_secs(5),
    );

    sampler.tick();

    // The failing sink came first; the healthy one still got the snapshot.
    assert_eq!(received.lock().unwrap().len(), 1);

    // The failure landed in the durable error log, tagged with the sink name.
    let log = std::fs::read_to_string(error_log_path("sinkfail")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields[1], "sink:failing");
    assert!(fields[2].contains("disk full"));
}

#[test]
fn subsystem_failure_zeroes_its_section_and_continues() {
    let raw = RawCounterSet {
        logical_cores: 1,
        memory_total_bytes: 1024 * 1024 * 1024,
        memory_used_bytes: 512 * 1024 * 1024,
        disk: None,
        network: None,
        processes: vec![raw_process(1, Some("/bin/a"), "a", 0)],
        ..RawCounterSet::default()
    };
    let sample = Sample {
        raw,
        baseline: Baseline::default(),
        failures: vec![
            SourceError::SubsystemUnavailable {
                subsystem: "disk",
                reason: "no disks reported".to_string(),
            },
            SourceError::SubsystemUnavailable {
                subsystem: "network",
                reason: "no network interfaces reported".to_string(),
            },
        ],
    };

    let snapshot = sampler_for(vec![sample], MemorySink::default(), "subsys").tick();

    // Failed sections come out zeroed; the rest of the tick is intact.
    assert_eq!(snapshot.system.disk_usage_percent, 0.0);
    assert_eq!(snapshot.system.network_recv_mb, 0.0);
    assert_eq!(snapshot.system.memory_usage_percent, 50.0);
    assert_eq!(snapshot.processes.len(), 1);

    // Both failures were recorded durably, one line each, with the
    // subsystem name in the second field.
    let log = std::fs::read_to_string(error_log_path("subsys")).unwrap();
    let subsystems: Vec<&str> = log
        .lines()
        .map(|line| line.split('\t').nth(1).unwrap())
        .collect();
    assert_eq!(subsystems, ["disk", "network"]);
}
