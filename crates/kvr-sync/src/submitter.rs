//! Eye submitter - bridges one eye's rendered buffer to the compositor

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{trace, warn};

use kvr_core::{CompositorError, Eye, EyeTexture, KvrError, PoseSeq, TextureBounds};

use crate::{Compositor, CycleProgress, PoseClock, SkipReason};

/// What one render callback did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Exactly one compositor call was made and it succeeded
    Submitted { pose: PoseSeq, progress: CycleProgress },
    /// No compositor call was made
    Skipped(SkipReason),
}

impl SubmitOutcome {
    #[inline]
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted { .. })
    }
}

/// A compositor call that was made and failed.
/// The eye's cycle stalls; the next render for the same pose retries.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("{eye} eye submit for pose {pose} failed ({consecutive} in a row): {source}")]
    Compositor {
        eye: Eye,
        pose: PoseSeq,
        consecutive: u32,
        #[source]
        source: CompositorError,
    },
}

impl SubmitError {
    pub fn eye(&self) -> Eye {
        match self {
            SubmitError::Compositor { eye, .. } => *eye,
        }
    }

    /// Failures for this eye since its last successful submit
    pub fn consecutive_failures(&self) -> u32 {
        match self {
            SubmitError::Compositor { consecutive, .. } => *consecutive,
        }
    }
}

impl From<SubmitError> for KvrError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Compositor { eye, source, .. } => KvrError::Compositor { eye, source },
        }
    }
}

/// Per-eye counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitterStats {
    pub submitted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
}

/// Submits one eye's buffer at most once per fresh pose
pub struct EyeSubmitter<C> {
    eye: Eye,
    clock: Arc<PoseClock>,
    compositor: Arc<C>,
    /// Fixed per eye: full extent, vertically flipped
    bounds: TextureBounds,
    submitted: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    consecutive_failures: AtomicU32,
}

impl<C: Compositor> EyeSubmitter<C> {
    pub fn new(eye: Eye, clock: Arc<PoseClock>, compositor: Arc<C>) -> Self {
        EyeSubmitter {
            eye,
            clock,
            compositor,
            bounds: TextureBounds::FULL_FLIPPED,
            submitted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn eye(&self) -> Eye {
        self.eye
    }

    pub fn bounds(&self) -> &TextureBounds {
        &self.bounds
    }

    pub fn clock(&self) -> &Arc<PoseClock> {
        &self.clock
    }

    /// Render driver callback: the eye's buffer for this frame is ready.
    ///
    /// Submits only if the clock is fresh and this eye has not submitted
    /// for the current pose. The compositor call runs with the clock
    /// unlocked.
    pub fn on_frame_rendered(&self, texture: &EyeTexture) -> Result<SubmitOutcome, SubmitError> {
        let claim = match self.clock.try_claim(self.eye) {
            Ok(claim) => claim,
            Err(reason) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                trace!(eye = %self.eye, %reason, "frame not submitted");
                return Ok(SubmitOutcome::Skipped(reason));
            }
        };
        let pose = claim.pose();

        match self.compositor.submit(self.eye, texture, &self.bounds) {
            Ok(()) => {
                let progress = self.clock.complete(claim);
                self.submitted.fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                Ok(SubmitOutcome::Submitted { pose, progress })
            }
            Err(source) => {
                self.clock.release(claim);
                self.failed.fetch_add(1, Ordering::Relaxed);
                let consecutive = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    eye = %self.eye,
                    %pose,
                    code = source.code(),
                    consecutive,
                    "compositor submit failed: {}",
                    source
                );
                Err(SubmitError::Compositor {
                    eye: self.eye,
                    pose,
                    consecutive,
                    source,
                })
            }
        }
    }

    /// Failures since the last successful submit
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Forget the failure streak, e.g. after the session re-enables output
    pub fn reset_failures(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SubmitterStats {
        SubmitterStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use kvr_core::{TextureHandle, TextureType};

    use super::*;

    /// Records calls; fails while `failing` is set
    #[derive(Default)]
    struct TestCompositor {
        calls: Mutex<Vec<(Eye, TextureHandle)>>,
        failing: Mutex<Option<CompositorError>>,
    }

    impl Compositor for TestCompositor {
        fn submit(
            &self,
            eye: Eye,
            texture: &EyeTexture,
            bounds: &TextureBounds,
        ) -> Result<(), CompositorError> {
            assert!(bounds.is_vertically_flipped());
            self.calls.lock().push((eye, texture.handle));
            match *self.failing.lock() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn texture(raw: u64) -> EyeTexture {
        EyeTexture::new(TextureHandle::new(raw), TextureType::DirectX)
    }

    fn setup() -> (Arc<PoseClock>, Arc<TestCompositor>, EyeSubmitter<TestCompositor>, EyeSubmitter<TestCompositor>) {
        let clock = Arc::new(PoseClock::new());
        let compositor = Arc::new(TestCompositor::default());
        let left = EyeSubmitter::new(Eye::Left, Arc::clone(&clock), Arc::clone(&compositor));
        let right = EyeSubmitter::new(Eye::Right, Arc::clone(&clock), Arc::clone(&compositor));
        (clock, compositor, left, right)
    }

    #[test]
    fn test_stale_clock_skips() {
        let (_clock, compositor, left, _right) = setup();

        let outcome = left.on_frame_rendered(&texture(1)).unwrap();
        assert_eq!(outcome, SubmitOutcome::Skipped(SkipReason::NotFresh));
        assert!(compositor.calls.lock().is_empty());
        assert_eq!(left.stats().skipped, 1);
    }

    #[test]
    fn test_pair_then_idle() {
        let (clock, compositor, left, right) = setup();
        let pose = clock.mark_pose_fresh().unwrap();

        let a = left.on_frame_rendered(&texture(0xA)).unwrap();
        assert_eq!(
            a,
            SubmitOutcome::Submitted { pose, progress: CycleProgress::Pending }
        );

        let b = right.on_frame_rendered(&texture(0xB)).unwrap();
        assert_eq!(
            b,
            SubmitOutcome::Submitted { pose, progress: CycleProgress::Completed(pose) }
        );
        assert!(!clock.is_fresh());

        let c = left.on_frame_rendered(&texture(0xC)).unwrap();
        assert_eq!(c, SubmitOutcome::Skipped(SkipReason::NotFresh));

        let calls = compositor.calls.lock().clone();
        assert_eq!(
            calls,
            vec![(Eye::Left, TextureHandle::new(0xA)), (Eye::Right, TextureHandle::new(0xB))]
        );
    }

    #[test]
    fn test_same_eye_twice() {
        let (clock, compositor, left, _right) = setup();
        clock.mark_pose_fresh();

        assert!(left.on_frame_rendered(&texture(1)).unwrap().is_submitted());
        assert_eq!(
            left.on_frame_rendered(&texture(2)).unwrap(),
            SubmitOutcome::Skipped(SkipReason::AlreadySubmitted)
        );
        assert_eq!(compositor.calls.lock().len(), 1);
    }

    #[test]
    fn test_failure_then_retry_same_pose() {
        let (clock, compositor, left, right) = setup();
        let pose = clock.mark_pose_fresh().unwrap();

        *compositor.failing.lock() = Some(CompositorError::DoNotHaveFocus);
        let err = left.on_frame_rendered(&texture(1)).unwrap_err();
        assert_eq!(err.eye(), Eye::Left);
        assert_eq!(err.consecutive_failures(), 1);
        assert_eq!(left.consecutive_failures(), 1);

        // Right proceeds; the cycle stays open on Left
        *compositor.failing.lock() = None;
        let outcome = right.on_frame_rendered(&texture(2)).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Submitted { pose, progress: CycleProgress::Pending }
        );
        assert!(clock.is_fresh());

        let retry = left.on_frame_rendered(&texture(3)).unwrap();
        assert_eq!(
            retry,
            SubmitOutcome::Submitted { pose, progress: CycleProgress::Completed(pose) }
        );
        assert_eq!(left.consecutive_failures(), 0);
        assert_eq!(compositor.calls.lock().len(), 3);
    }

    #[test]
    fn test_shutdown_no_submissions() {
        let (clock, compositor, left, right) = setup();
        clock.mark_pose_fresh();
        clock.shutdown();

        for submitter in [&left, &right] {
            assert_eq!(
                submitter.on_frame_rendered(&texture(9)).unwrap(),
                SubmitOutcome::Skipped(SkipReason::Shutdown)
            );
        }
        assert!(compositor.calls.lock().is_empty());
        assert!(!clock.is_fresh());
    }

    /// Shuts the clock down from inside the submit call
    struct ShutdownDuringSubmit {
        clock: Arc<PoseClock>,
        calls: AtomicU64,
    }

    impl Compositor for ShutdownDuringSubmit {
        fn submit(
            &self,
            _eye: Eye,
            _texture: &EyeTexture,
            _bounds: &TextureBounds,
        ) -> Result<(), CompositorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.clock.shutdown();
            Ok(())
        }
    }

    #[test]
    fn test_shutdown_while_in_flight() {
        let clock = Arc::new(PoseClock::new());
        let compositor = Arc::new(ShutdownDuringSubmit {
            clock: Arc::clone(&clock),
            calls: AtomicU64::new(0),
        });
        let left = EyeSubmitter::new(Eye::Left, Arc::clone(&clock), Arc::clone(&compositor));
        let pose = clock.mark_pose_fresh().unwrap();

        // The in-flight call finishes, but its completion is not recorded
        let outcome = left.on_frame_rendered(&texture(1)).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Submitted { pose, progress: CycleProgress::Ignored }
        );
        assert!(!clock.is_fresh());
        assert_eq!(clock.phase(), crate::CyclePhase::ShutDown);
        assert_eq!(clock.stats().cycles_completed, 0);

        assert_eq!(
            left.on_frame_rendered(&texture(2)).unwrap(),
            SubmitOutcome::Skipped(SkipReason::Shutdown)
        );
        assert_eq!(compositor.calls.load(Ordering::SeqCst), 1);
        assert!(!clock.is_fresh());
    }

    #[test]
    fn test_submit_error_converts() {
        let err = SubmitError::Compositor {
            eye: Eye::Left,
            pose: PoseSeq::new(3),
            consecutive: 2,
            source: CompositorError::InvalidTexture,
        };
        let kvr: KvrError = err.into();
        assert!(matches!(kvr, KvrError::Compositor { eye: Eye::Left, .. }));
    }
}
