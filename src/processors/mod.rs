//! Data processing modules.

pub mod clustering;
pub mod filtering;
pub mod frames;
pub mod motion;
pub mod pipeline;

// Re-export key types for convenience
pub use clustering::{dedupe, dedupe_using, dedupe_with, IndexKind, SpatialIndex};
pub use filtering::{AxisRange, BoundingCuboid, CuboidError};
pub use frames::{FrameError, FrameLoader, FrameStats, Session};
pub use motion::{MotionError, MotionFlags, MotionTracker, Part, StateVector, Thresholds, VelocityResult};
pub use pipeline::{BatchReport, Pipeline, PipelineError};
