//! Configuration types for the crane scan pipeline.
//!
//! The run parameters are required: a missing or malformed key is a startup
//! error. Every required key also accepts the spelling used by the legacy
//! JSON parameter files (`"First Frame"`, `"MinX"`, ...); since JSON is valid
//! YAML those files load unchanged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::loaders::FrameLayout;
use crate::processors::clustering::IndexKind;
use crate::processors::filtering::{AxisRange, BoundingCuboid, CuboidError};
use crate::processors::motion::Thresholds;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid config: {0}")]
    Cuboid(#[from] CuboidError),
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `frame<N>.csv` point files
    #[serde(default = "default_points_dir")]
    pub points_dir: PathBuf,

    /// Directory holding `state<N>.csv` crane state files
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Motion audit log, truncated at the start of every run
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Directory for rendered images and exported batches
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_points_dir() -> PathBuf {
    PathBuf::from("Data/PC")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("Data/State")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("Log.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            points_dir: default_points_dir(),
            state_dir: default_state_dir(),
            log_file: default_log_file(),
            output_dir: default_output_dir(),
        }
    }
}

/// Settings for rendered batch images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Maximum points drawn per image (subsampled by stride above this)
    #[serde(default = "default_render_max_points")]
    pub max_points: usize,

    /// Marker radius in pixels
    #[serde(default = "default_point_size")]
    pub point_size: u32,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    960
}

fn default_render_max_points() -> usize {
    1_000_000
}

fn default_point_size() -> u32 {
    1
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            max_points: default_render_max_points(),
            point_size: default_point_size(),
        }
    }
}

/// Main pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First frame index to process
    #[serde(alias = "First Frame")]
    pub first_frame: u32,

    /// Frame index to stop before
    #[serde(alias = "Last Frame")]
    pub last_frame: u32,

    #[serde(alias = "MinX")]
    pub min_x: f32,
    #[serde(alias = "MaxX")]
    pub max_x: f32,
    #[serde(alias = "MinY")]
    pub min_y: f32,
    #[serde(alias = "MaxY")]
    pub max_y: f32,
    #[serde(alias = "MinZ")]
    pub min_z: f32,
    #[serde(alias = "MaxZ")]
    pub max_z: f32,

    /// Minimum distance between two kept points
    #[serde(alias = "Closeness")]
    pub closeness: f32,

    /// Speed limits; a frame is dropped when any part exceeds its limit
    #[serde(alias = "Trolley Threshold")]
    pub trolley_threshold: f32,
    #[serde(alias = "Jib Threshold")]
    pub jib_threshold: f32,
    #[serde(alias = "Hook Threshold")]
    pub hook_threshold: f32,

    /// Seconds between consecutive frames
    #[serde(alias = "Time Between Frames")]
    pub time_between_frames: f32,

    /// Frames processed together
    #[serde(alias = "Batch Size")]
    pub batch_size: u32,

    /// Enable proximity deduplication
    #[serde(alias = "Clustering")]
    pub clustering: bool,

    /// Enable cuboid slicing
    #[serde(alias = "Slicing")]
    pub slicing: bool,

    /// Enable rendering
    #[serde(alias = "Inspection")]
    pub inspection: bool,

    /// Camera preset for rendering: Front, Back, Left, Right or Top
    #[serde(alias = "View Point")]
    pub view_point: String,

    #[serde(default)]
    pub dedupe_index: IndexKind,

    /// Write each processed batch to `<output_dir>/batch_<start>_<end>.csv`
    #[serde(default)]
    pub export_csv: bool,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

impl PipelineConfig {
    /// Load and validate configuration from a YAML (or JSON) file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from a string.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check value ranges that the type system does not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_frame > self.last_frame {
            return Err(ConfigError::Invalid(format!(
                "first_frame ({}) is after last_frame ({})",
                self.first_frame, self.last_frame
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if !(self.closeness.is_finite() && self.closeness >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "closeness must be a non-negative number, got {}",
                self.closeness
            )));
        }
        for (name, value) in [
            ("trolley_threshold", self.trolley_threshold),
            ("jib_threshold", self.jib_threshold),
            ("hook_threshold", self.hook_threshold),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if !(self.time_between_frames.is_finite() && self.time_between_frames > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "time_between_frames must be positive, got {}",
                self.time_between_frames
            )));
        }
        self.cuboid()?;
        Ok(())
    }

    pub fn cuboid(&self) -> Result<BoundingCuboid, CuboidError> {
        BoundingCuboid::new(
            AxisRange { min: self.min_x, max: self.max_x },
            AxisRange { min: self.min_y, max: self.max_y },
            AxisRange { min: self.min_z, max: self.max_z },
        )
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.trolley_threshold, self.jib_threshold, self.hook_threshold)
    }

    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(&self.paths.points_dir, &self.paths.state_dir)
    }
}
