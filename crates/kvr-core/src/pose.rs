//! Pose primitives
//!
//! The submission core never looks inside a pose. It only needs to know
//! that one was acquired and which acquisition a submission belongs to,
//! so every accepted pose is stamped with a [`PoseSeq`].

use std::fmt;

/// Sequence number of an accepted tracking pose.
/// Strictly increasing for the lifetime of a pose clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PoseSeq(pub u64);

impl PoseSeq {
    /// Sentinel for "no pose accepted yet"
    pub const ZERO: PoseSeq = PoseSeq(0);

    #[inline]
    pub fn new(seq: u64) -> Self {
        PoseSeq(seq)
    }

    #[inline]
    pub fn next(self) -> Self {
        PoseSeq(self.0.wrapping_add(1))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PoseSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pose(#{})", self.0)
    }
}

impl fmt::Display for PoseSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 3x4 row-major rigid transform, as reported by the tracking runtime
pub type PoseMatrix = [[f32; 4]; 3];

pub const IDENTITY_POSE: PoseMatrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Tracking result for one poll.
/// Opaque to the submission core; carried through for the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseSnapshot {
    /// Tracking runtime frame counter at acquisition
    pub frame_index: u64,
    /// HMD device-to-absolute (seated universe) transform
    pub hmd_to_absolute: PoseMatrix,
    /// Left eye-to-head transform
    pub left_eye_to_head: PoseMatrix,
    /// Right eye-to-head transform
    pub right_eye_to_head: PoseMatrix,
    /// Runtime reported a valid pose for the HMD
    pub valid: bool,
}

impl PoseSnapshot {
    /// Snapshot with identity transforms, useful for headless drivers
    pub fn identity(frame_index: u64) -> Self {
        PoseSnapshot {
            frame_index,
            hmd_to_absolute: IDENTITY_POSE,
            left_eye_to_head: IDENTITY_POSE,
            right_eye_to_head: IDENTITY_POSE,
            valid: true,
        }
    }
}
