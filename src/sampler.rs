use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::normalize::{NormalizeOptions, normalize};
use crate::engine::snapshot::{AssembleOptions, Snapshot, assemble};
use crate::errorlog::ErrorLog;
use crate::sink::Sink;
use crate::system::source::CounterSource;

/// Drives the sampling loop: one tick runs counter source → normalizer →
/// aggregator → ranker → assembler → sinks to completion before the next
/// sleep begins. Ticks are never pipelined; the source's delta baseline is
/// only ever touched from this single timeline.
pub struct Sampler {
    source: Box<dyn CounterSource>,
    sinks: Vec<Box<dyn Sink>>,
    normalize_opts: NormalizeOptions,
    assemble_opts: AssembleOptions,
    error_log: ErrorLog,
    interval: Duration,
}

impl Sampler {
    pub fn new(
        source: Box<dyn CounterSource>,
        sinks: Vec<Box<dyn Sink>>,
        normalize_opts: NormalizeOptions,
        assemble_opts: AssembleOptions,
        error_log: ErrorLog,
        interval: Duration,
    ) -> Self {
        Sampler {
            source,
            sinks,
            normalize_opts,
            assemble_opts,
            error_log,
            interval,
        }
    }

    /// One complete sampling-to-persistence cycle. Subsystem and sink
    /// failures are logged and never abort the tick; the returned snapshot
    /// is what the sinks were offered.
    pub fn tick(&mut self) -> Snapshot {
        debug!("sampling tick");
        let sample = self.source.sample();

        for failure in &sample.failures {
            warn!(subsystem = failure.subsystem(), %failure, "counter subsystem unavailable");
            self.error_log
                .record(failure.subsystem(), &failure.to_string());
        }

        let normalized = normalize(&sample.raw, &sample.baseline, self.normalize_opts);
        let snapshot = assemble(Utc::now(), normalized, self.assemble_opts);

        for sink in &mut self.sinks {
            if let Err(err) = sink.append(&snapshot) {
                warn!(sink = sink.name(), error = %err, "sink append failed");
                self.error_log
                    .record(&format!("sink:{}", sink.name()), &err.to_string());
            }
        }

        info!(
            timestamp = %snapshot.timestamp,
            processes = snapshot.processes.len(),
            "data collected"
        );
        snapshot
    }

    /// Run until cancelled. Cancellation is observed at tick boundaries: a
    /// pending sleep is preempted by the `select!`, a tick in flight runs to
    /// completion, so the last written snapshot is always whole.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        info!("monitoring stopped by user");
    }
}
