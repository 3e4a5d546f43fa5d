//! Batch orchestration: deduplicate, slice and render frame batches.

use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};
use crate::core::loaders::PointCloud;
use crate::core::writers::{write_points_csv, AuditLog, WriteError};
use crate::visualization::{BatchRenderer, PngRenderer, VisualizationError};
use super::clustering::dedupe_using;
use super::filtering::BoundingCuboid;
use super::frames::{FrameError, FrameLoader, FrameStats, Session};
use super::motion::MotionTracker;

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Frames(#[from] FrameError),

    #[error(transparent)]
    Visualization(#[from] VisualizationError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Outcome of one processed batch.
///
/// Point counts are `None` for stages that did not run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub frames: Range<u32>,
    /// Points read from frame files
    pub points_loaded: Option<usize>,
    pub after_dedupe: Option<usize>,
    pub after_slice: Option<usize>,
    /// Points handed to the renderer
    pub rendered: Option<usize>,
    pub exported: Option<PathBuf>,
    pub stats: FrameStats,
}

impl BatchReport {
    fn new(frames: Range<u32>) -> Self {
        Self {
            frames,
            points_loaded: None,
            after_dedupe: None,
            after_slice: None,
            rendered: None,
            exported: None,
            stats: FrameStats::default(),
        }
    }

    /// Size of the batch's final cloud, if any stage ran.
    pub fn final_points(&self) -> Option<usize> {
        self.rendered.or(self.after_slice).or(self.after_dedupe)
    }
}

/// Runs the enabled stages over consecutive frame batches.
///
/// Stages run in the fixed order deduplicate, slice, render. Each enabled
/// stage takes the previous enabled stage's output; the first enabled stage
/// loads the batch's frames itself. With no stage enabled a batch does
/// nothing, not even read its frames.
///
/// One pipeline owns one [`Session`], so motion tracking carries across
/// batches and each frame is visited at most once.
pub struct Pipeline<W: Write = File> {
    config: PipelineConfig,
    cuboid: BoundingCuboid,
    loader: FrameLoader,
    session: Session<W>,
    renderer: Box<dyn BatchRenderer>,
}

impl Pipeline<File> {
    /// Build a pipeline that logs to `paths.log_file` (truncated) and renders
    /// PNG images into `paths.output_dir`.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let log = AuditLog::create(&config.paths.log_file)?;
        let renderer = PngRenderer::new(&config.paths.output_dir, config.render.clone());
        Self::with_parts(config, log, Box::new(renderer))
    }
}

impl<W: Write> Pipeline<W> {
    /// Assemble a pipeline from explicit parts.
    ///
    /// Fails if `config` does not pass [`PipelineConfig::validate`].
    pub fn with_parts(
        config: PipelineConfig,
        log: AuditLog<W>,
        renderer: Box<dyn BatchRenderer>,
    ) -> Result<Self> {
        config.validate()?;
        let cuboid = config.cuboid().map_err(ConfigError::from)?;
        let tracker = MotionTracker::new(config.thresholds(), config.time_between_frames);

        Ok(Self {
            loader: FrameLoader::new(config.layout()),
            session: Session::new(tracker, log),
            cuboid,
            renderer,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn session(&self) -> &Session<W> {
        &self.session
    }

    pub fn into_session(self) -> Session<W> {
        self.session
    }

    /// True if at least one stage is enabled.
    pub fn has_stages(&self) -> bool {
        self.config.clustering || self.config.slicing || self.config.inspection
    }

    /// Frame ranges covering `first_frame..last_frame` in `batch_size` steps.
    ///
    /// The last range is cut short at `last_frame`.
    pub fn batches(&self) -> Vec<Range<u32>> {
        let first = self.config.first_frame;
        let last = self.config.last_frame;
        let size = self.config.batch_size.max(1);

        (first..last)
            .step_by(size as usize)
            .map(|start| start..start.saturating_add(size).min(last))
            .collect()
    }

    /// Process every batch in order.
    pub fn run(&mut self) -> Result<Vec<BatchReport>> {
        let batches = self.batches();
        let mut reports = Vec::with_capacity(batches.len());

        for frames in batches {
            reports.push(self.run_batch(frames)?);
        }

        Ok(reports)
    }

    /// Process one batch of frames.
    pub fn run_batch(&mut self, frames: Range<u32>) -> Result<BatchReport> {
        let before = self.session.stats();
        let mut report = BatchReport::new(frames.clone());
        let mut cloud: Option<PointCloud> = None;

        if self.config.clustering {
            let input = self.load(&frames, &mut report)?;
            let deduped = dedupe_using(&input, self.config.closeness, self.config.dedupe_index);
            report.after_dedupe = Some(deduped.len());
            cloud = Some(deduped);
        }

        if self.config.slicing {
            let input = match cloud.take() {
                Some(c) => c,
                None => self.load(&frames, &mut report)?,
            };
            let sliced = self.cuboid.filter(&input);
            debug!("Frames {}..{}: sliced {} -> {} points", frames.start, frames.end, input.len(), sliced.len());
            report.after_slice = Some(sliced.len());
            cloud = Some(sliced);
        }

        if self.config.inspection {
            let input = match cloud.take() {
                Some(c) => c,
                None => self.load(&frames, &mut report)?,
            };
            self.renderer.render(&input, &self.config.view_point, frames.clone())?;
            report.rendered = Some(input.len());
            cloud = Some(input);
        }

        if self.config.export_csv {
            if let Some(cloud) = &cloud {
                let path = self
                    .config
                    .paths
                    .output_dir
                    .join(format!("batch_{}_{}.csv", frames.start, frames.end));
                write_points_csv(&path, cloud)?;
                report.exported = Some(path);
            }
        }

        report.stats = self.session.stats().since(&before);

        match report.final_points() {
            Some(n) => info!(
                "Frames {}..{}: {} frames kept, {} excluded, {} missing, {} points out",
                frames.start, frames.end, report.stats.loaded, report.stats.excluded, report.stats.missing, n
            ),
            None => debug!("Frames {}..{}: no stage enabled", frames.start, frames.end),
        }

        Ok(report)
    }

    fn load(&mut self, frames: &Range<u32>, report: &mut BatchReport) -> Result<PointCloud> {
        let cloud = self
            .loader
            .load_range(&mut self.session, frames.start, frames.end)?;
        report.points_loaded = Some(cloud.len());
        Ok(cloud)
    }
}
