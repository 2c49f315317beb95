//! Pose clock - the freshness gate shared by both eye submitters

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use kvr_core::{Eye, PoseSeq};

use crate::{ClockStats, CycleProgress, CyclePhase, CycleState, EyeClaim, SkipReason};

/// Process-wide pose freshness state.
///
/// Every operation is one short critical section over [`CycleState`].
/// Nothing here blocks; compositor calls happen between `try_claim` and
/// `complete`/`release`, with the lock released.
#[derive(Debug, Default)]
pub struct PoseClock {
    state: Mutex<CycleState>,
}

impl PoseClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per tracking poll. Returns the new pose sequence,
    /// or `None` once the clock is shut down.
    pub fn mark_pose_fresh(&self) -> Option<PoseSeq> {
        let mut state = self.state.lock();
        let superseded = state.is_fresh();
        let pose = state.arm()?;
        if superseded {
            trace!(%pose, "fresh pose superseded an unconsumed one");
        }
        Some(pose)
    }

    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.state.lock().is_fresh()
    }

    pub fn current_pose(&self) -> Option<PoseSeq> {
        self.state.lock().current_pose()
    }

    pub fn phase(&self) -> CyclePhase {
        self.state.lock().phase()
    }

    /// Record that `eye` submitted for the current pose.
    /// Closes the cycle when both eyes are in.
    pub fn notify_eye_submitted(&self, eye: Eye) -> CycleProgress {
        let progress = self.state.lock().notify_eye_submitted(eye);
        if let CycleProgress::Completed(pose) = progress {
            trace!(%pose, "stereo cycle completed");
        }
        progress
    }

    pub fn try_claim(&self, eye: Eye) -> Result<EyeClaim, SkipReason> {
        self.state.lock().try_claim(eye)
    }

    pub fn complete(&self, claim: EyeClaim) -> CycleProgress {
        let eye = claim.eye();
        let pose = claim.pose();
        let progress = self.state.lock().complete(claim);
        match progress {
            CycleProgress::Completed(_) => trace!(%pose, "stereo cycle completed"),
            CycleProgress::Ignored => debug!(%eye, %pose, "completion for superseded pose ignored"),
            CycleProgress::Pending => {}
        }
        progress
    }

    pub fn release(&self, claim: EyeClaim) {
        self.state.lock().release(claim);
    }

    /// Permanently stop the clock. Later marks and claims are no-ops.
    pub fn shutdown(&self) {
        if self.state.lock().shutdown() {
            info!("pose clock shut down");
        }
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().is_shutdown()
    }

    pub fn stats(&self) -> ClockStats {
        self.state.lock().stats().clone()
    }
}
