//! Row-oriented delimited-text sinks: one header line, then one line per
//! record, `;`-separated. The all-processes, system-metrics and
//! network-detail files grow by appending; the top-N files are rewritten
//! whole each tick and only ever hold the latest ranking.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Sink, SinkError};
use crate::engine::snapshot::Snapshot;
use crate::format::format_timestamp;

const DELIMITER: char = ';';

/// Field values may contain the delimiter or newlines (command lines often
/// do); squash them to spaces rather than quoting.
fn sanitize(field: &str) -> String {
    field
        .chars()
        .map(|c| if c == DELIMITER || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn append_rows(path: &Path, header: &str, rows: &[String]) -> Result<(), SinkError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{header}")?;
    }
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(())
}

fn rewrite_rows(path: &Path, header: &str, rows: &[String]) -> Result<(), SinkError> {
    let mut file = File::create(path)?;
    writeln!(file, "{header}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(())
}

/// Appends one row per live process per tick.
pub struct AllProcessesCsv {
    path: PathBuf,
}

impl AllProcessesCsv {
    pub const HEADER: &'static str = "timestamp;process_name;pid;cpu_percent;memory_usage_mb";

    pub fn new(path: PathBuf) -> Self {
        AllProcessesCsv { path }
    }
}

impl Sink for AllProcessesCsv {
    fn name(&self) -> &'static str {
        "all-processes-csv"
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let ts = format_timestamp(snapshot.timestamp);
        let rows: Vec<String> = snapshot
            .processes
            .iter()
            .map(|p| {
                format!(
                    "{ts};{};{};{:.2};{:.2}",
                    sanitize(&p.name),
                    p.pid,
                    p.cpu_percent,
                    p.memory_mb
                )
            })
            .collect();
        append_rows(&self.path, Self::HEADER, &rows)
    }
}

/// Rewritten whole each tick: the latest aggregated top-N, one row per
/// distinct binary.
pub struct TopProcessesCsv {
    path: PathBuf,
}

impl TopProcessesCsv {
    pub const HEADER: &'static str =
        "timestamp;executable;process_name;cpu_percent;memory_usage_mb;instance_count";

    pub fn new(path: PathBuf) -> Self {
        TopProcessesCsv { path }
    }
}

impl Sink for TopProcessesCsv {
    fn name(&self) -> &'static str {
        "top-processes-csv"
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let ts = format_timestamp(snapshot.timestamp);
        let rows: Vec<String> = snapshot
            .top_aggregated
            .iter()
            .map(|r| {
                format!(
                    "{ts};{};{};{:.2};{:.2};{}",
                    sanitize(&r.executable),
                    sanitize(&r.name),
                    r.cpu_percent,
                    r.memory_mb,
                    r.instance_count
                )
            })
            .collect();
        rewrite_rows(&self.path, Self::HEADER, &rows)
    }
}

/// Rewritten whole each tick: the latest per-PID detailed top-N.
pub struct TopProcessDetailCsv {
    path: PathBuf,
}

impl TopProcessDetailCsv {
    pub const HEADER: &'static str = "timestamp;pid;ppid;process_name;command;owner;status;\
threads;started_at;cpu_percent;memory_usage_mb;memory_percent;virtual_mb;\
io_read_total_mb;io_write_total_mb;io_read_delta_mb;io_write_delta_mb";

    pub fn new(path: PathBuf) -> Self {
        TopProcessDetailCsv { path }
    }
}

impl Sink for TopProcessDetailCsv {
    fn name(&self) -> &'static str {
        "top-process-detail-csv"
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let ts = format_timestamp(snapshot.timestamp);
        let mut rows = Vec::with_capacity(snapshot.top_detailed.len());
        for d in &snapshot.top_detailed {
            let mut row = String::new();
            let _ = write!(
                row,
                "{ts};{};{};{};{};{};{};{};{};{:.2};{:.2};{:.2};{:.2};{:.2};{:.2};{:.2};{:.2}",
                d.pid,
                d.parent_pid.map(|p| p.to_string()).unwrap_or_default(),
                sanitize(&d.name),
                sanitize(&d.command),
                d.owner.as_deref().map(sanitize).unwrap_or_default(),
                sanitize(&d.status),
                d.thread_count.map(|t| t.to_string()).unwrap_or_default(),
                d.started_at,
                d.cpu_percent,
                d.memory_mb,
                d.memory_percent,
                d.virtual_mb,
                d.io_read_total_mb,
                d.io_write_total_mb,
                d.io_read_delta_mb,
                d.io_write_delta_mb
            );
            rows.push(row);
        }
        rewrite_rows(&self.path, Self::HEADER, &rows)
    }
}

/// Appends one system-wide row per tick.
pub struct SystemMetricsCsv {
    path: PathBuf,
}

impl SystemMetricsCsv {
    pub const HEADER: &'static str = "timestamp;cpu_usage_percent;memory_usage_percent;\
disk_usage_percent;network_sent_mb;network_recv_mb;network_sent_delta_mb;network_recv_delta_mb";

    pub fn new(path: PathBuf) -> Self {
        SystemMetricsCsv { path }
    }
}

impl Sink for SystemMetricsCsv {
    fn name(&self) -> &'static str {
        "system-metrics-csv"
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let s = &snapshot.system;
        let row = format!(
            "{};{:.2};{:.2};{:.2};{:.2};{:.2};{:.2};{:.2}",
            format_timestamp(snapshot.timestamp),
            s.cpu_usage_percent,
            s.memory_usage_percent,
            s.disk_usage_percent,
            s.network_sent_mb,
            s.network_recv_mb,
            s.network_sent_delta_mb,
            s.network_recv_delta_mb
        );
        append_rows(&self.path, Self::HEADER, &[row])
    }
}

/// Appends one row per network interface per tick.
pub struct NetworkDetailCsv {
    path: PathBuf,
}

impl NetworkDetailCsv {
    pub const HEADER: &'static str = "timestamp;interface;recv_total_mb;sent_total_mb;\
recv_delta_mb;sent_delta_mb;rx_packets;tx_packets";

    pub fn new(path: PathBuf) -> Self {
        NetworkDetailCsv { path }
    }
}

impl Sink for NetworkDetailCsv {
    fn name(&self) -> &'static str {
        "network-detail-csv"
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let ts = format_timestamp(snapshot.timestamp);
        let rows: Vec<String> = snapshot
            .interfaces
            .iter()
            .map(|i| {
                format!(
                    "{ts};{};{:.2};{:.2};{:.2};{:.2};{};{}",
                    sanitize(&i.name),
                    i.recv_total_mb,
                    i.sent_total_mb,
                    i.recv_delta_mb,
                    i.sent_delta_mb,
                    i.rx_packets,
                    i.tx_packets
                )
            })
            .collect();
        append_rows(&self.path, Self::HEADER, &rows)
    }
}
