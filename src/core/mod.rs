//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{FrameLayout, LoaderError, PointCloud};
pub use writers::{write_points_csv, AuditLog, WriteError};
