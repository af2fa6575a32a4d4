//! Pure sampling-and-ranking engine: no OS access, no file I/O, no runtime.
//! Everything here is a function of the raw counters and the delta baseline
//! handed in by the counter source.

pub mod aggregate;
pub mod normalize;
pub mod rank;
pub mod snapshot;
