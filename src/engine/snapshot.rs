use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::{AggregatedRecord, aggregate_by_identity};
use super::normalize::{InterfaceMetrics, NormalizedSample, ProcessDetail, ProcessRecord, SystemMetrics};
use super::rank::rank_top_n;

/// How many rows each ranked view retains.
#[derive(Clone, Copy, Debug)]
pub struct AssembleOptions {
    /// Aggregated-by-binary view.
    pub top_n: usize,
    /// Raw per-PID detail view; ranked independently of the aggregated view.
    pub detail_top_n: usize,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        AssembleOptions {
            top_n: 10,
            detail_top_n: 30,
        }
    }
}

/// One tick's complete, immutable output. Every field shares the single
/// `timestamp` the tick was captured at; nothing here is re-read from the
/// clock per field. Handed to sinks and then dropped by the engine.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    /// Every process that survived the sample, unranked.
    pub processes: Vec<ProcessRecord>,
    /// Top-N binaries by summed (cpu, memory), descending.
    pub top_aggregated: Vec<AggregatedRecord>,
    /// Top-N individual processes with full detail fields.
    pub top_detailed: Vec<ProcessDetail>,
    pub interfaces: Vec<InterfaceMetrics>,
}

/// Combine one tick's normalized views into a snapshot. Pure: the capture
/// timestamp is supplied by the caller, read exactly once per tick.
pub fn assemble(
    timestamp: DateTime<Utc>,
    sample: NormalizedSample,
    opts: AssembleOptions,
) -> Snapshot {
    let top_aggregated = rank_top_n(aggregate_by_identity(&sample.processes), opts.top_n);
    let top_detailed = rank_top_n(sample.details, opts.detail_top_n);

    Snapshot {
        timestamp,
        system: sample.system,
        processes: sample.processes,
        top_aggregated,
        top_detailed,
        interfaces: sample.interfaces,
    }
}
