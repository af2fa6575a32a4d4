use std::collections::HashMap;

use serde::Serialize;

use super::normalize::ProcessRecord;

/// One row per distinct binary: the resource totals of every live process
/// sharing an executable identity (full path, falling back to process name
/// when the path is unreadable).
#[derive(Clone, Debug, Serialize)]
pub struct AggregatedRecord {
    /// Grouping key; identity fields come from the first record seen and are
    /// never overwritten by later merges.
    pub executable: String,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: f64,
    pub virtual_mb: f64,
    pub io_read_delta_mb: f64,
    pub io_write_delta_mb: f64,
    pub instance_count: u32,
}

impl AggregatedRecord {
    fn from_record(identity: String, record: &ProcessRecord) -> Self {
        AggregatedRecord {
            executable: identity,
            name: record.name.clone(),
            cpu_percent: record.cpu_percent,
            memory_percent: record.memory_percent,
            memory_mb: record.memory_mb,
            virtual_mb: record.virtual_mb,
            io_read_delta_mb: record.io_read_delta_mb,
            io_write_delta_mb: record.io_write_delta_mb,
            instance_count: 1,
        }
    }

    fn merge(&mut self, record: &ProcessRecord) {
        self.cpu_percent += record.cpu_percent;
        self.memory_percent += record.memory_percent;
        self.memory_mb += record.memory_mb;
        self.virtual_mb += record.virtual_mb;
        self.io_read_delta_mb += record.io_read_delta_mb;
        self.io_write_delta_mb += record.io_write_delta_mb;
        self.instance_count += 1;
    }
}

/// The key a process aggregates under.
pub fn identity_key(record: &ProcessRecord) -> &str {
    record.executable.as_deref().unwrap_or(&record.name)
}

/// Merge process records sharing an executable identity into composite
/// totals. Summation is plain addition, so totals are independent of input
/// order; rows come out in first-encounter order of each identity, which
/// keeps downstream ranking deterministic.
pub fn aggregate_by_identity(records: &[ProcessRecord]) -> Vec<AggregatedRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<AggregatedRecord> = Vec::new();

    for record in records {
        let key = identity_key(record);
        match index.get(key) {
            Some(&i) => rows[i].merge(record),
            None => {
                index.insert(key.to_string(), rows.len());
                rows.push(AggregatedRecord::from_record(key.to_string(), record));
            }
        }
    }

    rows
}
