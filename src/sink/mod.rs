pub mod csv;
pub mod json;

use thiserror::Error;

use crate::engine::snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable append of one snapshot. Implementations own their file layout;
/// the engine only promises that `append` is called once per tick, after the
/// snapshot is fully assembled, and never concurrently.
pub trait Sink {
    /// Sink name for logging.
    fn name(&self) -> &'static str;

    fn append(&mut self, snapshot: &Snapshot) -> Result<(), SinkError>;
}
