//! Crane motion tracking and speed gating.
//!
//! The tracker keeps the last seen position of each crane part (trolley, jib,
//! hook). Every frame's state is compared against it to decide which parts
//! moved, and the movement is converted to a speed using the fixed time
//! between frames. A frame in which any part exceeds its speed limit is
//! disqualified by the frame loader.

use std::fmt;
use std::ops::{Index, IndexMut};

use log::warn;
use thiserror::Error;

use crate::core::writers::{AuditLog, WriteError};

/// Smallest absolute position change that counts as movement.
pub const MOTION_EPSILON: f32 = 0.001;

/// Errors raised while tracking motion.
#[derive(Error, Debug)]
pub enum MotionError {
    /// Frames must be fed in strictly increasing order, each exactly once.
    #[error("frame {got} received after frame {previous}; frames must be strictly increasing")]
    FrameOrder { previous: u32, got: u32 },

    #[error(transparent)]
    Log(#[from] WriteError),
}

pub type Result<T> = std::result::Result<T, MotionError>;

/// A tracked crane part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    Trolley,
    Jib,
    Hook,
}

impl Part {
    /// All parts, in state-file column order.
    pub const ALL: [Part; 3] = [Part::Trolley, Part::Jib, Part::Hook];

    pub fn name(self) -> &'static str {
        match self {
            Part::Trolley => "Trolley",
            Part::Jib => "Jib",
            Part::Hook => "Hook",
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per crane part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartValues<T> {
    pub trolley: T,
    pub jib: T,
    pub hook: T,
}

impl<T> PartValues<T> {
    pub fn new(trolley: T, jib: T, hook: T) -> Self {
        Self { trolley, jib, hook }
    }

    /// Build from a function of each part.
    pub fn from_fn(mut f: impl FnMut(Part) -> T) -> Self {
        Self {
            trolley: f(Part::Trolley),
            jib: f(Part::Jib),
            hook: f(Part::Hook),
        }
    }
}

impl<T: Copy> PartValues<T> {
    /// Iterate `(part, value)` pairs in trolley, jib, hook order.
    pub fn iter(&self) -> impl Iterator<Item = (Part, T)> + '_ {
        Part::ALL.into_iter().map(move |part| (part, self[part]))
    }
}

impl<T> Index<Part> for PartValues<T> {
    type Output = T;

    fn index(&self, part: Part) -> &T {
        match part {
            Part::Trolley => &self.trolley,
            Part::Jib => &self.jib,
            Part::Hook => &self.hook,
        }
    }
}

impl<T> IndexMut<Part> for PartValues<T> {
    fn index_mut(&mut self, part: Part) -> &mut T {
        match part {
            Part::Trolley => &mut self.trolley,
            Part::Jib => &mut self.jib,
            Part::Hook => &mut self.hook,
        }
    }
}

impl<T: Copy> From<[T; 3]> for PartValues<T> {
    fn from([trolley, jib, hook]: [T; 3]) -> Self {
        Self { trolley, jib, hook }
    }
}

/// Positions of the trolley, jib and hook in one frame.
pub type StateVector = PartValues<f32>;

/// Which parts moved since the previous frame.
pub type MotionFlags = PartValues<bool>;

/// Speed limit per part, in position units per second.
pub type Thresholds = PartValues<f32>;

impl MotionFlags {
    pub fn any(&self) -> bool {
        self.trolley || self.jib || self.hook
    }
}

/// Speed of each part and whether it exceeded its limit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocityResult {
    pub speed: PartValues<f32>,
    pub too_fast: PartValues<bool>,
}

impl VelocityResult {
    /// True if any part moved faster than allowed.
    pub fn disqualifies(&self) -> bool {
        self.too_fast.any()
    }
}

/// Per-session record of crane part positions.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    thresholds: Thresholds,
    time_between_frames: f32,
    previous: Option<StateVector>,
    last_delta: PartValues<f32>,
    last_frame: Option<u32>,
}

impl MotionTracker {
    pub fn new(thresholds: Thresholds, time_between_frames: f32) -> Self {
        Self {
            thresholds,
            time_between_frames,
            previous: None,
            last_delta: PartValues::default(),
            last_frame: None,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Baseline position used for the next comparison, if any frame was seen.
    pub fn baseline(&self) -> Option<&StateVector> {
        self.previous.as_ref()
    }

    /// Last frame index passed to [`detect_motion`](Self::detect_motion).
    pub fn last_frame(&self) -> Option<u32> {
        self.last_frame
    }

    /// Compare `state` with the stored baseline and replace the baseline.
    ///
    /// The first call of a session only stores the baseline and reports no
    /// motion. The baseline is replaced on every accepted call, whether or not
    /// the frame is later disqualified.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::FrameOrder`] if `frame` is not greater than the
    /// previous frame; the tracker is left untouched in that case.
    pub fn detect_motion(&mut self, frame: u32, state: StateVector) -> Result<MotionFlags> {
        if let Some(previous) = self.last_frame {
            if frame <= previous {
                return Err(MotionError::FrameOrder { previous, got: frame });
            }
        }

        let flags = match self.previous {
            Some(baseline) => {
                self.last_delta = PartValues::from_fn(|part| (state[part] - baseline[part]).abs());
                PartValues::from_fn(|part| self.last_delta[part] > MOTION_EPSILON)
            }
            None => MotionFlags::default(),
        };

        self.previous = Some(state);
        self.last_frame = Some(frame);

        Ok(flags)
    }

    /// Convert the last detected movement into speeds and check the limits.
    ///
    /// Parts not flagged in `flags` get speed 0. Each part over its limit is
    /// reported as a warning and appended to `log`.
    pub fn compute_velocity<W: std::io::Write>(
        &self,
        flags: &MotionFlags,
        log: &mut AuditLog<W>,
    ) -> Result<VelocityResult> {
        let speed = PartValues::from_fn(|part| {
            if flags[part] {
                self.last_delta[part] / self.time_between_frames
            } else {
                0.0
            }
        });
        let too_fast = PartValues::from_fn(|part| speed[part] > self.thresholds[part]);

        for (part, over) in too_fast.iter() {
            if over {
                warn!("{} is too fast! Speed: {}", part, speed[part]);
                log.too_fast(part.name(), speed[part])?;
            }
        }

        Ok(VelocityResult { speed, too_fast })
    }
}
