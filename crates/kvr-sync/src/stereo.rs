//! Stereo submitter - one pose clock and both eyes on one compositor

use std::sync::Arc;

use kvr_core::{Eye, EyeTexture, PerEye, PoseSeq};

use crate::{ClockStats, Compositor, EyeSubmitter, PoseClock, SubmitError, SubmitOutcome, SubmitterStats};

/// Both eye submitters sharing a clock and a compositor.
/// Eye callbacks may be driven from different threads.
pub struct StereoSubmitter<C> {
    clock: Arc<PoseClock>,
    eyes: PerEye<EyeSubmitter<C>>,
}

impl<C: Compositor> StereoSubmitter<C> {
    pub fn new(compositor: Arc<C>) -> Self {
        let clock = Arc::new(PoseClock::new());
        let eyes = PerEye::new(
            EyeSubmitter::new(Eye::Left, Arc::clone(&clock), Arc::clone(&compositor)),
            EyeSubmitter::new(Eye::Right, Arc::clone(&clock), compositor),
        );
        StereoSubmitter { clock, eyes }
    }

    pub fn clock(&self) -> &Arc<PoseClock> {
        &self.clock
    }

    pub fn eye(&self, eye: Eye) -> &EyeSubmitter<C> {
        self.eyes.get(eye)
    }

    /// Tracking poll acquired a pose
    pub fn mark_pose_fresh(&self) -> Option<PoseSeq> {
        self.clock.mark_pose_fresh()
    }

    pub fn is_fresh(&self) -> bool {
        self.clock.is_fresh()
    }

    /// Render driver callback for `eye`
    pub fn on_frame_rendered(
        &self,
        eye: Eye,
        texture: &EyeTexture,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.eyes.get(eye).on_frame_rendered(texture)
    }

    pub fn shutdown(&self) {
        self.clock.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.clock.is_shutdown()
    }

    pub fn reset_failures(&self) {
        self.eyes.left.reset_failures();
        self.eyes.right.reset_failures();
    }

    pub fn clock_stats(&self) -> ClockStats {
        self.clock.stats()
    }

    pub fn eye_stats(&self) -> PerEye<SubmitterStats> {
        PerEye::new(self.eyes.left.stats(), self.eyes.right.stats())
    }
}
