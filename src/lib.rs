pub mod config;
pub mod engine;
pub mod errorlog;
pub mod format;
pub mod sampler;
pub mod sink;
pub mod system;
