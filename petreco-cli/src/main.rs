//! petreco CLI - Command-line interface for PET event reconstruction.
//!
//! Reads threshold-crossing edges from JSON-lines files, runs the
//! reconstruction chain and writes the classified events as CSV.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};
use petreco_algorithms::{process_stream, WindowPipeline};
use petreco_core::{BarrelGeometry, EdgeKind, PipelineConfig, RunContext, TimeCalibration};
use petreco_io::{load_calibration, load_config, load_geometry, EdgeStreamReader, EventCsvWriter};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PetrecoIo(#[from] petreco_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] petreco_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event reconstruction for plastic-scintillator PET detectors.
#[derive(Parser)]
#[command(name = "petreco")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct events from edge streams
    Process {
        /// Input edge stream(s), JSON lines
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline configuration (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Detector geometry (JSON); the three-layer barrel when omitted
        #[arg(long)]
        geometry: Option<PathBuf>,

        /// Time calibration constants (JSON)
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Time windows processed in parallel per batch
        #[arg(long, default_value = "64")]
        batch_windows: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about an edge stream
    Info {
        /// Input edge stream
        input: PathBuf,
    },

    /// Print the default configuration as JSON
    Defaults {
        /// Print the default geometry instead
        #[arg(long)]
        geometry: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            geometry,
            calibration,
            batch_windows,
            verbose,
        } => {
            init_logging(verbose);

            let config = match config {
                Some(path) => load_config(path)?,
                None => PipelineConfig::default(),
            };
            let geometry = match geometry {
                Some(path) => load_geometry(path)?,
                None => BarrelGeometry::default(),
            };
            let calibration = match calibration {
                Some(path) => load_calibration(path)?,
                None => TimeCalibration::new(),
            };
            log::debug!(
                "geometry: {} layers, {} scintillators; {} calibration constants",
                geometry.layers.len(),
                geometry.scintillator_count(),
                calibration.len()
            );

            let pipeline = WindowPipeline::new(&config, &geometry)?.with_calibration(&calibration);
            let mut writer = EventCsvWriter::create(&output)?;
            let mut run = RunContext::new();
            let start = Instant::now();

            for path in &input {
                log::info!("reading {}", path.display());
                run.begin_input();

                let mut read_error = None;
                let edges = EdgeStreamReader::open(path)?.map_while(|item| match item {
                    Ok(edge) => Some(edge),
                    Err(err) => {
                        read_error = Some(err);
                        None
                    }
                });
                process_stream(&pipeline, edges, batch_windows, &mut run, |number, event| {
                    writer.write_event(number, event)?;
                    Ok::<(), CliError>(())
                })?;
                if let Some(err) = read_error {
                    return Err(err.into());
                }
            }
            writer.flush()?;

            let elapsed = start.elapsed();
            let summary = run.finish();
            println!(
                "Processed {} files in {:.2}s",
                input.len(),
                elapsed.as_secs_f64()
            );
            println!("Windows: {}", summary.diagnostics.windows_processed);
            println!("Hits: {}", summary.diagnostics.hits_built);
            println!("Events: {}", summary.total_events);
            println!("Output: {}", output.display());
        }

        Commands::Info { input } => {
            let mut edges = 0u64;
            let mut leading = 0u64;
            let mut windows = BTreeSet::new();
            let mut channels = BTreeSet::new();
            let mut time_range: Option<(i64, i64)> = None;

            for item in EdgeStreamReader::open(&input)? {
                let (window, edge) = item?;
                edges += 1;
                if edge.kind == EdgeKind::Leading {
                    leading += 1;
                }
                windows.insert(window);
                channels.insert(edge.channel);
                time_range = Some(match time_range {
                    Some((lo, hi)) => (lo.min(edge.time_ps), hi.max(edge.time_ps)),
                    None => (edge.time_ps, edge.time_ps),
                });
            }

            println!("File: {}", input.display());
            println!("Edges: {} ({} leading, {} trailing)", edges, leading, edges - leading);
            println!("Windows: {}", windows.len());
            println!("Channels: {}", channels.len());
            if let Some((lo, hi)) = time_range {
                println!("Time range: {} - {} ps", lo, hi);
            }
        }

        Commands::Defaults { geometry } => {
            let text = if geometry {
                serde_json::to_string_pretty(&BarrelGeometry::default())?
            } else {
                serde_json::to_string_pretty(&PipelineConfig::default())?
            };
            println!("{}", text);
        }
    }

    Ok(())
}
