//! Command-line interface for the crane scan pipeline.

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{PathsConfig, RenderConfig};
use crate::core::loaders::{self, FrameLayout};
use crate::core::writers;
use crate::processors::clustering;
use crate::visualization::{self, Viewpoint};
use crate::{BatchReport, Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "crane-scan")]
#[command(about = "Crane point cloud frame processing", version)]
pub struct Cli {
    /// Path to YAML (or JSON) config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured stages over every frame batch
    Run {
        /// Override the first frame from the config
        #[arg(long)]
        first_frame: Option<u32>,
        /// Override the frame to stop before
        #[arg(long)]
        last_frame: Option<u32>,
    },

    /// Drop points closer than a radius to an earlier point
    Dedupe {
        /// Input point CSV (x,y,z rows)
        input: PathBuf,
        /// Output point CSV
        output: PathBuf,
        /// Closeness radius (defaults to the config's closeness)
        #[arg(short, long)]
        radius: Option<f32>,
    },

    /// Keep the points inside the configured cuboid
    Slice {
        /// Input point CSV (x,y,z rows)
        input: PathBuf,
        /// Output point CSV
        output: PathBuf,
    },

    /// Render a point CSV as a 3D scatter (PNG)
    Render {
        /// Input point CSV (x,y,z rows)
        input: PathBuf,
        /// Output PNG file path (defaults to the input path with .png extension)
        output: Option<PathBuf>,
        /// Viewpoint: Front, Back, Left, Right or Top (defaults to the config's view_point)
        #[arg(long)]
        view: Option<String>,
    },

    /// List available frames and frames missing a state file
    Frames {
        /// Directory of frame<N>.csv files (defaults to the config's points_dir)
        #[arg(long)]
        points_dir: Option<PathBuf>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over frame batches
fn create_batch_bar(batches: usize) -> ProgressBar {
    let pb = ProgressBar::new(batches as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            format!("{}...", value.chars().take(34).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // A config that was asked for but cannot be used is fatal
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                Some(cfg)
            }
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let result = match cli.command {
        Commands::Run { first_frame, last_frame } => cmd_run(config, first_frame, last_frame),
        Commands::Dedupe { input, output, radius } => {
            cmd_dedupe(&input, &output, radius, config.as_ref())
        }
        Commands::Slice { input, output } => cmd_slice(&input, &output, config.as_ref()),
        Commands::Render { input, output, view } => {
            cmd_render(&input, output, view, config.as_ref())
        }
        Commands::Frames { points_dir } => cmd_frames(points_dir, config.as_ref()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn require_config<'a>(config: Option<&'a PipelineConfig>, command: &str) -> Result<&'a PipelineConfig> {
    config.with_context(|| format!("'{}' needs a config file, pass one with --config", command))
}

fn cmd_run(config: Option<PipelineConfig>, first_frame: Option<u32>, last_frame: Option<u32>) -> Result<()> {
    let mut config = require_config(config.as_ref(), "run")?.clone();
    if let Some(first) = first_frame {
        config.first_frame = first;
    }
    if let Some(last) = last_frame {
        config.last_frame = last;
    }

    let start = Instant::now();
    let log_file = config.paths.log_file.clone();
    let output_dir = config.paths.output_dir.clone();

    let mut pipeline = Pipeline::from_config(config).context("Failed to start pipeline")?;
    if !pipeline.has_stages() {
        warn!("Clustering, slicing and inspection are all disabled; no frames will be read");
    }

    let batches = pipeline.batches();
    let pb = create_batch_bar(batches.len());
    let result = run_batches(&mut pipeline, batches, &pb);
    pb.finish_and_clear();
    let reports = result?;

    let stats = pipeline.session().stats();
    let points_out: usize = reports.iter().filter_map(|r| r.final_points()).sum();
    let exported = reports.iter().filter(|r| r.exported.is_some()).count();
    let cfg = pipeline.config();

    print_summary(
        "Run Complete",
        &[
            ("Frames", format!("{}..{}", cfg.first_frame, cfg.last_frame)),
            ("Batches", reports.len().to_string()),
            ("Frames kept", stats.loaded.to_string()),
            ("Frames too fast", stats.excluded.to_string()),
            ("Frames missing", stats.missing.to_string()),
            ("Points out", points_out.to_string()),
            ("Batches exported", exported.to_string()),
            ("Audit log", log_file.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn run_batches(
    pipeline: &mut Pipeline,
    batches: Vec<std::ops::Range<u32>>,
    pb: &ProgressBar,
) -> Result<Vec<BatchReport>> {
    let mut reports = Vec::with_capacity(batches.len());
    for frames in batches {
        pb.set_message(format!("frames {}..{}", frames.start, frames.end));
        let report = pipeline
            .run_batch(frames.clone())
            .with_context(|| format!("Batch {}..{} failed", frames.start, frames.end))?;
        reports.push(report);
        pb.inc(1);
    }
    Ok(reports)
}

fn cmd_dedupe(input: &Path, output: &Path, radius: Option<f32>, config: Option<&PipelineConfig>) -> Result<()> {
    let start = Instant::now();

    let radius = match (radius, config) {
        (Some(r), _) => r,
        (None, Some(cfg)) => cfg.closeness,
        (None, None) => bail!("No radius given, pass --radius or a config with closeness"),
    };
    ensure!(radius.is_finite() && radius >= 0.0, "Radius must be a non-negative number, got {}", radius);
    let kind = config.map(|c| c.dedupe_index).unwrap_or_default();

    let spinner = create_spinner("Deduplicating points...");
    let result = (|| -> Result<(usize, usize)> {
        let cloud = loaders::load_points_csv(input)
            .with_context(|| format!("Failed to load points from {}", input.display()))?;
        let kept = clustering::dedupe_using(&cloud, radius, kind);
        writers::write_points_csv(output, &kept)?;
        Ok((cloud.len(), kept.len()))
    })();
    spinner.finish_and_clear();
    let (before, after) = result?;

    print_summary(
        "Deduplication Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Radius", radius.to_string()),
            ("Index", format!("{:?}", kind)),
            ("Points in", before.to_string()),
            ("Points kept", after.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_slice(input: &Path, output: &Path, config: Option<&PipelineConfig>) -> Result<()> {
    let start = Instant::now();
    let cuboid = require_config(config, "slice")?.cuboid()?;

    let spinner = create_spinner("Slicing points...");
    let result = (|| -> Result<(usize, usize)> {
        let cloud = loaders::load_points_csv(input)
            .with_context(|| format!("Failed to load points from {}", input.display()))?;
        let sliced = cuboid.filter(&cloud);
        writers::write_points_csv(output, &sliced)?;
        Ok((cloud.len(), sliced.len()))
    })();
    spinner.finish_and_clear();
    let (before, after) = result?;

    let (x, y, z) = (cuboid.x(), cuboid.y(), cuboid.z());
    print_summary(
        "Slicing Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("X range", format!("{} .. {}", x.min, x.max)),
            ("Y range", format!("{} .. {}", y.min, y.max)),
            ("Z range", format!("{} .. {}", z.min, z.max)),
            ("Points in", before.to_string()),
            ("Points kept", after.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_render(
    input: &Path,
    output: Option<PathBuf>,
    view: Option<String>,
    config: Option<&PipelineConfig>,
) -> Result<()> {
    let start = Instant::now();

    let view_name = match (view, config) {
        (Some(v), _) => v,
        (None, Some(cfg)) => cfg.view_point.clone(),
        (None, None) => bail!("No viewpoint given, pass --view or a config with view_point"),
    };
    let view: Viewpoint = view_name.parse()?;
    let settings = config.map(|c| c.render.clone()).unwrap_or_else(RenderConfig::default);

    let output_path = output.unwrap_or_else(|| input.with_extension("png"));

    let spinner = create_spinner("Loading point file...");
    let result = (|| -> Result<usize> {
        let cloud = loaders::load_points_csv(input)
            .with_context(|| format!("Failed to load points from {}", input.display()))?;
        spinner.set_message("Generating plot...");
        visualization::plot_point_cloud(&output_path, &cloud, view, &settings)?;
        Ok(cloud.len())
    })();
    spinner.finish_and_clear();
    let points = result?;

    let (elevation, azimuth) = view.angles();
    print_summary(
        "Render Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Viewpoint", format!("{} ({}, {})", view, elevation, azimuth)),
            ("Points in cloud", points.to_string()),
            ("Max points plotted", settings.max_points.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_frames(points_dir: Option<PathBuf>, config: Option<&PipelineConfig>) -> Result<()> {
    let paths = config.map(|c| c.paths.clone()).unwrap_or_else(PathsConfig::default);
    let layout = FrameLayout::new(points_dir.unwrap_or(paths.points_dir), paths.state_dir);

    let frames = loaders::scan_frame_indices(&layout.points_dir)
        .with_context(|| format!("Failed to scan {}", layout.points_dir.display()))?;
    let without_state: Vec<u32> = frames
        .iter()
        .copied()
        .filter(|&n| !layout.state_file(n).is_file())
        .collect();

    for frame in &without_state {
        info!("Frame {}: no state file at {}", frame, layout.state_file(*frame).display());
    }

    let span = match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => format!("{}..={}", first, last),
        _ => "none".to_string(),
    };
    let gaps = match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => (last - first) as usize + 1 - frames.len(),
        _ => 0,
    };

    print_summary(
        "Frame Scan",
        &[
            ("Points directory", layout.points_dir.display().to_string()),
            ("State directory", layout.state_dir.display().to_string()),
            ("Frames found", frames.len().to_string()),
            ("Frame span", span),
            ("Gaps in span", gaps.to_string()),
            ("Missing state file", format!("{:?}", without_state)),
        ],
    );

    Ok(())
}
