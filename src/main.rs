//! CLI entry point for the signal monitor.
//!
//! Drives the pipeline from the synthetic acquisition source so the whole
//! producer/worker path can be exercised without hardware.
//!
//! # Usage
//!
//! ```bash
//! signal-monitor run --batches 500 --metric average --roi 10,10,64,64 --csv out.csv
//! signal-monitor check-config --config config/signal_monitor.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_monitor::config::{MonitorConfig, DEFAULT_CONFIG_PATH};
use signal_monitor::history::MetricHistory;
use signal_monitor::logging::{self, LoggingConfig, OutputFormat};
use signal_monitor::mock::{Pattern, SyntheticSource};
use signal_monitor::{
    FrameDescriptor, MetricKind, MonitorEvent, RegionOfInterest, SignalMonitor, StreamSource,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "signal-monitor")]
#[command(about = "Real-time frame statistics for acquisition streams", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed synthetic frames through the pipeline and print the metrics
    Run {
        /// Stream to monitor (raw or processed)
        #[arg(long)]
        stream: Option<StreamSource>,

        /// Metric to emit (sum, average, stddev, cov)
        #[arg(long)]
        metric: Option<MetricKind>,

        /// Region of interest as x,y,width,height
        #[arg(long, value_parser = parse_roi)]
        roi: Option<RegionOfInterest>,

        /// Sample every Nth buffer
        #[arg(long)]
        decimation: Option<u32>,

        /// Buffer within the volume to sample (-1 = all)
        #[arg(long, allow_hyphen_values = true)]
        buffer: Option<i64>,

        /// Frame within each buffer to sample
        #[arg(long)]
        frame: Option<u32>,

        /// Number of acquisition buffers to generate
        #[arg(long, default_value_t = 100)]
        batches: u32,

        /// Bits per sample
        #[arg(long, default_value_t = 16)]
        bits: u32,

        #[arg(long, default_value_t = 256)]
        width: u32,

        #[arg(long, default_value_t = 256)]
        height: u32,

        #[arg(long, default_value_t = 4)]
        frames_per_buffer: u32,

        #[arg(long, default_value_t = 2)]
        buffers_per_volume: u32,

        /// Test pattern (constant:<value>, ramp, noise:<mean>:<amplitude>)
        #[arg(long, default_value = "noise:1000:200", value_parser = parse_pattern)]
        pattern: Pattern,

        /// Pause between buffers in milliseconds
        #[arg(long, default_value_t = 1)]
        interval_ms: u64,

        /// Export the metric history as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Load and validate the configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig => check_config(&cli.config),
        Commands::Run {
            stream,
            metric,
            roi,
            decimation,
            buffer,
            frame,
            batches,
            bits,
            width,
            height,
            frames_per_buffer,
            buffers_per_volume,
            pattern,
            interval_ms,
            csv,
        } => {
            let config = load_config(&cli.config)?;
            logging::init(
                LoggingConfig::from_monitor_config(&config)
                    .map_err(anyhow::Error::msg)?
                    .with_format(cli.log_format),
            )
            .map_err(anyhow::Error::msg)?;

            let layout = FrameDescriptor {
                sample_width_bits: bits,
                samples_per_line: width,
                lines_per_frame: height,
                frames_per_buffer,
                buffers_per_volume,
                current_buffer_index: 0,
            };
            let source = SyntheticSource::with_layout(layout, pattern)
                .context("Invalid synthetic frame layout")?;

            let mut settings = config.defaults;
            if let Some(stream) = stream {
                settings.stream_source = stream;
            }
            if let Some(metric) = metric {
                settings.metric = metric;
            }
            if let Some(roi) = roi {
                settings.set_roi(roi);
            }
            if let Some(decimation) = decimation {
                settings.decimation_factor = decimation;
            }
            if let Some(buffer) = buffer {
                settings.target_buffer_index = buffer;
            }
            if let Some(frame) = frame {
                settings.target_frame_index = frame;
            }

            let run = RunOptions {
                batches,
                interval: Duration::from_millis(interval_ms),
                csv,
            };
            run_pipeline(&config, source, settings, run).await
        }
    }
}

struct RunOptions {
    batches: u32,
    interval: Duration,
    csv: Option<PathBuf>,
}

struct RunSummary {
    lost: u32,
    processed: u64,
}

async fn run_pipeline(
    config: &MonitorConfig,
    mut source: SyntheticSource,
    settings: signal_monitor::MonitorSettings,
    options: RunOptions,
) -> Result<()> {
    let monitor = SignalMonitor::with_config(&config.pipeline).context("Failed to start monitor")?;
    monitor.apply_settings(&settings);

    let stream = settings.stream_source;
    let mut history = MetricHistory::new(config.history.max_points, settings.visible_samples as usize);
    let mut events = monitor.subscribe();

    info!(%stream, batches = options.batches, "Starting synthetic acquisition");

    let batches = options.batches;
    let interval = options.interval;
    let producer = tokio::task::spawn_blocking(move || {
        for _ in 0..batches {
            let (buffer, descriptor) = source.next_batch();
            monitor.on_frame_batch(stream, &buffer, &descriptor);
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
        RunSummary {
            lost: monitor.lost_frames(stream),
            processed: monitor.processed_frames(),
        }
        // Dropping the monitor joins the worker and closes the event bus.
    });

    let consumer = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if history.record(&event, Some(stream)) {
                        if let MonitorEvent::Metric { kind, value, statistics, .. } = &event {
                            println!(
                                "{:>8}  {kind}: {value:.3}  (min {:.0}, max {:.0}, {} px)",
                                history.points().last().map_or(0, |p| p.sample),
                                statistics.min,
                                statistics.max,
                                statistics.pixels
                            );
                        }
                    } else {
                        match &event {
                            MonitorEvent::Error(message) => eprintln!("error: {message}"),
                            MonitorEvent::BoundsChanged { bound, .. } => println!("bounds: {bound:?}"),
                            _ => {}
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Console fell behind the event bus"),
                Err(RecvError::Closed) => break,
            }
        }
    };

    let (summary, ()) = tokio::join!(producer, consumer);
    let summary = summary.context("Producer task failed")?;

    println!();
    println!("Buffers generated: {}", options.batches);
    println!("Frames processed:  {}", summary.processed);
    println!("Frames lost:       {}", summary.lost);
    println!("Metric points:     {}", history.len());
    if let Some((low, high)) = history.value_range() {
        println!("Value range:       {low:.3} .. {high:.3}");
    }

    if let Some(path) = options.csv {
        export_history(&history, &path)?;
        println!("History written to {}", path.display());
    }

    Ok(())
}

#[cfg(feature = "storage_csv")]
fn export_history(history: &MetricHistory, path: &Path) -> Result<()> {
    history
        .save_csv(path)
        .with_context(|| format!("Failed to export {}", path.display()))
}

#[cfg(not(feature = "storage_csv"))]
fn export_history(_history: &MetricHistory, _path: &Path) -> Result<()> {
    anyhow::bail!("CSV export requires the storage_csv feature")
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    let config = MonitorConfig::load_from(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    println!("Configuration OK ({})", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn parse_roi(s: &str) -> Result<RegionOfInterest, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("Invalid ROI '{}'. Expected x,y,width,height", s));
    };
    let coord = |v: &str| v.parse::<i32>().map_err(|e| format!("Invalid ROI coordinate '{v}': {e}"));
    let extent = |v: &str| v.parse::<u32>().map_err(|e| format!("Invalid ROI extent '{v}': {e}"));
    Ok(RegionOfInterest::new(coord(x)?, coord(y)?, extent(w)?, extent(h)?))
}

fn parse_pattern(s: &str) -> Result<Pattern, String> {
    let mut parts = s.split(':');
    let number = |v: Option<&str>, name: &str| {
        v.ok_or_else(|| format!("Pattern '{s}' is missing {name}"))?
            .parse::<u32>()
            .map_err(|e| format!("Invalid {name} in pattern '{s}': {e}"))
    };
    match parts.next() {
        Some("ramp") => Ok(Pattern::Ramp),
        Some("constant") => Ok(Pattern::Constant(number(parts.next(), "value")?)),
        Some("noise") => Ok(Pattern::Noise {
            mean: number(parts.next(), "mean")?,
            amplitude: number(parts.next(), "amplitude")?,
        }),
        _ => Err(format!(
            "Invalid pattern '{}'. Must be constant:<value>, ramp or noise:<mean>:<amplitude>",
            s
        )),
    }
}
