use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub interval_seconds: u64,
    /// Rows kept in the aggregated-by-binary ranking.
    pub top_n: usize,
    /// Rows kept in the per-PID detail ranking; independent of `top_n`.
    pub detail_top_n: usize,
    /// When true, per-process CPU percentages are divided by the logical
    /// core count (100% = whole machine). When false, 100% = one core and a
    /// busy multi-threaded process can exceed 100.
    pub per_core_normalization: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            interval_seconds: 5,
            top_n: 10,
            detail_top_n: 30,
            per_core_normalization: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    /// "csv" or "json".
    pub format: String,
    /// Which tables to emit: any of "all-processes", "top-processes",
    /// "system-metrics", "network-detail".
    pub targets: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: "ticktop-data".to_string(),
            format: "csv".to_string(),
            targets: vec![
                "all-processes".to_string(),
                "top-processes".to_string(),
                "system-metrics".to_string(),
            ],
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ticktop").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
