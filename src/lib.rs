//! Crane point cloud frame processing.
//!
//! This crate provides tools for:
//! - Loading per-frame point clouds and crane state vectors from CSV
//! - Tracking trolley, jib and hook motion, and dropping frames captured while
//!   a part moved faster than its limit
//! - Proximity deduplication and axis-aligned cuboid slicing of point batches
//! - Rendering processed batches from named camera viewpoints
//!
//! # Example
//!
//! ```no_run
//! use crane_scan::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_yaml("crane.yaml").unwrap();
//! let mut pipeline = Pipeline::from_config(config).unwrap();
//! for report in pipeline.run().unwrap() {
//!     println!("{:?}: {:?} points", report.frames, report.final_points());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{PathsConfig, PipelineConfig, RenderConfig};
pub use core::loaders::{FrameLayout, PointCloud};
pub use processors::pipeline::{BatchReport, Pipeline, PipelineError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
