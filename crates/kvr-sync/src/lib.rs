//! KVR Sync - Stereo frame submission synchronizer
//!
//! This crate implements the pose/frame handshake between the tracking
//! poll and the two eye render callbacks:
//! - Cycle state: the pure transition logic of one stereo cycle
//! - Pose clock: lock-guarded freshness gate shared by both eyes
//! - Eye submitter: submits one eye's buffer at most once per fresh pose
//! - Stereo submitter: a clock and both eyes wired to one compositor
//!
//! INVARIANT: every completed cycle submits Left and Right for the same pose.

pub mod cycle;
pub mod clock;
pub mod compositor;
pub mod submitter;
pub mod stereo;

pub use cycle::*;
pub use clock::*;
pub use compositor::*;
pub use submitter::*;
pub use stereo::*;
