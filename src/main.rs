use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio_util::sync::CancellationToken;

use ticktop::config::{Config, OutputConfig, load_config, load_config_from_path};
use ticktop::engine::normalize::NormalizeOptions;
use ticktop::engine::snapshot::AssembleOptions;
use ticktop::errorlog::ErrorLog;
use ticktop::sampler::Sampler;
use ticktop::sink::Sink;
use ticktop::sink::csv::{
    AllProcessesCsv, NetworkDetailCsv, SystemMetricsCsv, TopProcessDetailCsv, TopProcessesCsv,
};
use ticktop::sink::json::{JsonDocumentSink, Projection};
use ticktop::system::source::SysinfoSource;

#[derive(Parser)]
#[command(
    name = "ticktop",
    about = "Recurring local telemetry sampler: periodic system/process snapshots to structured files"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for data files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Sampling interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// How many ranked processes to retain
    #[arg(long)]
    top_n: Option<usize>,

    /// Divide per-process CPU% by the logical core count
    /// (bare flag enables; `--per-core false` overrides the config file off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    per_core: Option<bool>,

    /// Output format: csv, json
    #[arg(long)]
    format: Option<String>,

    /// Output target (repeatable): all-processes, top-processes,
    /// system-metrics, network-detail
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Sample a single tick and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);

    // Configuration problems abort before the first tick; nothing mid-loop
    // is allowed to be fatal.
    let output_dir = PathBuf::from(&config.output.directory);
    fs::create_dir_all(&output_dir)
        .wrap_err_with(|| format!("cannot create output directory {}", output_dir.display()))?;
    let error_log = ErrorLog::open(&output_dir.join("errors.log"))
        .wrap_err_with(|| format!("output directory {} is not writable", output_dir.display()))?;

    let sinks = build_sinks(&config.output, &output_dir)?;

    let interval = Duration::from_secs(config.sampler.interval_seconds.max(1));
    let mut sampler = Sampler::new(
        Box::new(SysinfoSource::new()),
        sinks,
        NormalizeOptions {
            per_core: config.sampler.per_core_normalization,
        },
        AssembleOptions {
            top_n: config.sampler.top_n,
            detail_top_n: config.sampler.detail_top_n,
        },
        error_log,
        interval,
    );

    if cli.once {
        sampler.tick();
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    sampler.run(cancel).await;
    println!("Monitoring stopped by user.");

    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(ref dir) = cli.output_dir {
        config.output.directory = dir.to_string_lossy().to_string();
    }
    if let Some(interval) = cli.interval {
        config.sampler.interval_seconds = interval;
    }
    if let Some(top_n) = cli.top_n {
        config.sampler.top_n = top_n;
    }
    if let Some(per_core) = cli.per_core {
        config.sampler.per_core_normalization = per_core;
    }
    if let Some(ref format) = cli.format {
        config.output.format = format.clone();
    }
    if !cli.targets.is_empty() {
        config.output.targets = cli.targets.clone();
    }

    config
}

fn build_sinks(output: &OutputConfig, dir: &Path) -> Result<Vec<Box<dyn Sink>>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    for target in &output.targets {
        match (output.format.as_str(), target.as_str()) {
            ("csv", "all-processes") => {
                sinks.push(Box::new(AllProcessesCsv::new(dir.join("all_processes.csv"))));
            }
            ("csv", "top-processes") => {
                sinks.push(Box::new(TopProcessesCsv::new(dir.join("top_processes.csv"))));
                sinks.push(Box::new(TopProcessDetailCsv::new(
                    dir.join("top_process_detail.csv"),
                )));
            }
            ("csv", "system-metrics") => {
                sinks.push(Box::new(SystemMetricsCsv::new(
                    dir.join("system_metrics.csv"),
                )));
            }
            ("csv", "network-detail") => {
                sinks.push(Box::new(NetworkDetailCsv::new(
                    dir.join("network_detail.csv"),
                )));
            }
            ("json", "all-processes") => {
                sinks.push(Box::new(JsonDocumentSink::new(
                    dir.join("all_processes.json"),
                    Projection::AllProcesses,
                )));
            }
            ("json", "top-processes") => {
                sinks.push(Box::new(JsonDocumentSink::new(
                    dir.join("top_processes.json"),
                    Projection::TopProcesses,
                )));
            }
            ("json", "system-metrics") => {
                sinks.push(Box::new(JsonDocumentSink::new(
                    dir.join("system_metrics.json"),
                    Projection::SystemMetrics,
                )));
            }
            ("json", "network-detail") => {
                sinks.push(Box::new(JsonDocumentSink::new(
                    dir.join("network_detail.json"),
                    Projection::NetworkDetail,
                )));
            }
            (format, "all-processes" | "top-processes" | "system-metrics" | "network-detail") => {
                return Err(eyre!("unknown output format `{format}` (expected csv or json)"));
            }
            (_, target) => {
                return Err(eyre!(
                    "unknown output target `{target}` (expected all-processes, top-processes, system-metrics or network-detail)"
                ));
            }
        }
    }

    if sinks.is_empty() {
        return Err(eyre!("no output targets configured"));
    }

    Ok(sinks)
}
