//! Growing JSON-document sink: one JSON array per logical file, appended to
//! by reading the whole document, pushing one record and rewriting the file.
//!
//! This read-append-rewrite cycle costs O(total records so far) per tick. It
//! is acceptable for low-frequency, small-volume sampling, but it is a real
//! scaling limit: long captures should use the delimited-text sinks instead.

use std::fs;
use std::path::PathBuf;

use serde_json::{Value, json};

use super::{Sink, SinkError};
use crate::engine::snapshot::Snapshot;
use crate::format::round2;

/// Which slice of the snapshot this document records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    AllProcesses,
    TopProcesses,
    SystemMetrics,
    NetworkDetail,
}

impl Projection {
    fn record(self, snapshot: &Snapshot) -> Value {
        match self {
            Projection::AllProcesses => json!({
                "timestamp": snapshot.timestamp,
                "processes": snapshot.processes,
            }),
            Projection::TopProcesses => json!({
                "timestamp": snapshot.timestamp,
                "top_aggregated": snapshot.top_aggregated,
                "top_detailed": snapshot.top_detailed,
            }),
            Projection::SystemMetrics => json!({
                "timestamp": snapshot.timestamp,
                "system": snapshot.system,
            }),
            Projection::NetworkDetail => json!({
                "timestamp": snapshot.timestamp,
                "interfaces": snapshot.interfaces,
            }),
        }
    }
}

pub struct JsonDocumentSink {
    path: PathBuf,
    projection: Projection,
    name: &'static str,
}

impl JsonDocumentSink {
    pub fn new(path: PathBuf, projection: Projection) -> Self {
        let name = match projection {
            Projection::AllProcesses => "all-processes-json",
            Projection::TopProcesses => "top-processes-json",
            Projection::SystemMetrics => "system-metrics-json",
            Projection::NetworkDetail => "network-detail-json",
        };
        JsonDocumentSink {
            path,
            projection,
            name,
        }
    }

    fn read_document(&self) -> Result<Vec<Value>, SinkError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }
}

impl Sink for JsonDocumentSink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let mut records = self.read_document()?;
        let mut record = self.projection.record(snapshot);
        round_floats(&mut record);
        records.push(record);
        fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

/// Two-decimal rounding at the persistence boundary. Integers pass through
/// untouched; only floating-point leaves are rounded.
fn round_floats(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64()
                && n.is_f64()
                && let Some(rounded) = serde_json::Number::from_f64(round2(f))
            {
                *value = Value::Number(rounded);
            }
        }
        Value::Array(items) => {
            for item in items {
                round_floats(item);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                round_floats(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_floats_walks_nested_structure() {
        let mut value = json!({
            "a": 1.2345,
            "b": [2.999, {"c": 0.005}],
            "d": 42,
            "e": "text",
        });
        round_floats(&mut value);
        assert_eq!(value["a"], json!(1.23));
        assert_eq!(value["b"][0], json!(3.0));
        assert_eq!(value["d"], json!(42));
        assert_eq!(value["e"], json!("text"));
    }
}
