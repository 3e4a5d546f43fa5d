//! Frame range loading with speed-based frame disqualification.

use std::fs::File;
use std::io::Write;

use log::{debug, warn};
use thiserror::Error;

use crate::core::loaders::{load_points_csv, load_state_csv, FrameLayout, LoaderError, PointCloud};
use crate::core::writers::{AuditLog, WriteError};
use super::motion::{MotionError, MotionTracker, StateVector};

/// Errors that abort loading a frame range.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    Log(#[from] WriteError),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Frame outcome counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames whose points were kept.
    pub loaded: usize,
    /// Frames dropped because a part moved too fast.
    pub excluded: usize,
    /// Frames skipped because the point or state file was absent.
    pub missing: usize,
}

impl FrameStats {
    /// Counters accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &FrameStats) -> FrameStats {
        FrameStats {
            loaded: self.loaded - earlier.loaded,
            excluded: self.excluded - earlier.excluded,
            missing: self.missing - earlier.missing,
        }
    }
}

/// State owned by one processing run.
///
/// Holds the motion tracker, the audit log it reports into, and running frame
/// counters. A session must see frames in increasing order only, so one
/// session serves one pass over the data.
pub struct Session<W: Write = File> {
    pub tracker: MotionTracker,
    pub log: AuditLog<W>,
    stats: FrameStats,
}

impl<W: Write> Session<W> {
    pub fn new(tracker: MotionTracker, log: AuditLog<W>) -> Self {
        Self {
            tracker,
            log,
            stats: FrameStats::default(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn into_log(self) -> AuditLog<W> {
        self.log
    }
}

/// Reads frames from disk and filters out disqualified ones.
#[derive(Debug, Clone)]
pub struct FrameLoader {
    layout: FrameLayout,
}

impl FrameLoader {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Load and concatenate frames `start..end`.
    ///
    /// Frames without a point file are skipped silently; frames with a point
    /// file but no state file are skipped with a warning. For every other
    /// frame the tracker is updated and motion/speed events are logged before
    /// the frame is judged, so an excluded frame still moves the baseline and
    /// still appears in the audit log.
    ///
    /// # Errors
    ///
    /// Fails on malformed point or state data, on an out-of-order frame, or
    /// when the audit log cannot be written.
    pub fn load_range<W: Write>(
        &self,
        session: &mut Session<W>,
        start: u32,
        end: u32,
    ) -> Result<PointCloud> {
        let mut cloud = PointCloud::new();

        for frame in start..end {
            let point_path = self.layout.point_file(frame);
            if !point_path.is_file() {
                session.stats.missing += 1;
                continue;
            }

            let state_path = self.layout.state_file(frame);
            if !state_path.is_file() {
                warn!(
                    "Frame {}: state file {} not found, skipping frame",
                    frame,
                    state_path.display()
                );
                session.stats.missing += 1;
                continue;
            }

            let points = load_points_csv(&point_path)?;
            let state = StateVector::from(load_state_csv(&state_path)?);

            let moved = session.tracker.detect_motion(frame, state)?;
            for (part, flag) in moved.iter() {
                if flag {
                    session.log.motion(frame, part.name())?;
                }
            }
            let velocity = session.tracker.compute_velocity(&moved, &mut session.log)?;

            if velocity.disqualifies() {
                debug!("Frame {}: excluded ({} points)", frame, points.len());
                session.stats.excluded += 1;
            } else {
                debug!("Frame {}: {} points", frame, points.len());
                cloud.append(&points);
                session.stats.loaded += 1;
            }
        }

        Ok(cloud)
    }
}
