//! Pairing checker - replays a submission history against the stereo invariants
//!
//! Checked:
//! - At most one successful submit per eye between two pose marks
//! - A completed cycle pairs both eyes on the same pose
//! - No submit while the clock is stale, or for a pose other than the latest
//! - No compositor call after shutdown

use kvr_core::{Eye, PerEye, PoseSeq};
use kvr_sync::{SkipReason, SubmitError, SubmitOutcome};

/// One observable step of a run, in observation order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionEvent {
    Marked(PoseSeq),
    Submitted { eye: Eye, pose: PoseSeq, completed: bool },
    Failed { eye: Eye, pose: PoseSeq },
    Skipped { eye: Eye, reason: SkipReason },
    Shutdown,
}

impl SubmissionEvent {
    /// Event for the result of one `on_frame_rendered` call
    pub fn from_result(eye: Eye, result: &Result<SubmitOutcome, SubmitError>) -> Self {
        match result {
            Ok(SubmitOutcome::Submitted { pose, progress }) => SubmissionEvent::Submitted {
                eye,
                pose: *pose,
                completed: progress.is_completed(),
            },
            Ok(SubmitOutcome::Skipped(reason)) => SubmissionEvent::Skipped { eye, reason: *reason },
            Err(SubmitError::Compositor { pose, .. }) => SubmissionEvent::Failed { eye, pose: *pose },
        }
    }
}

/// Invariant breaches found by the checker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Second successful submit for an eye within one mark window
    DoubleSubmit { eye: Eye, pose: PoseSeq },
    /// Cycle completed with the eyes on different poses
    StalePair { pose: PoseSeq, left: Option<PoseSeq>, right: Option<PoseSeq> },
    /// Submit after the cycle completed and before the next mark
    SubmitWhileStale { eye: Eye },
    /// Submit for a pose other than the latest mark
    WrongPose { eye: Eye, expected: Option<PoseSeq>, got: PoseSeq },
    /// Compositor call after shutdown
    SubmitAfterShutdown { eye: Eye },
}

#[derive(Clone, Debug, Default)]
pub struct PairingChecker {
    latest: Option<PoseSeq>,
    fresh: bool,
    shutdown: bool,
    window_submits: PerEye<u32>,
    cycle: PerEye<Option<PoseSeq>>,
    cycles_completed: u64,
    events: u64,
    violations: Vec<Violation>,
}

impl PairingChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: SubmissionEvent) {
        self.events += 1;
        match event {
            SubmissionEvent::Marked(pose) => {
                if self.shutdown {
                    return;
                }
                self.latest = Some(pose);
                self.fresh = true;
                self.window_submits = PerEye::default();
                // An unfinished half cycle is abandoned by the new pose
                self.cycle = PerEye::default();
            }
            SubmissionEvent::Submitted { eye, pose, completed } => {
                self.check_call(eye, pose);
                let count = self.window_submits.get_mut(eye);
                *count += 1;
                if *count > 1 {
                    self.violations.push(Violation::DoubleSubmit { eye, pose });
                }
                *self.cycle.get_mut(eye) = Some(pose);

                if completed {
                    let (left, right) = (self.cycle.left, self.cycle.right);
                    if left != Some(pose) || right != Some(pose) {
                        self.violations.push(Violation::StalePair { pose, left, right });
                    }
                    self.cycles_completed += 1;
                    self.fresh = false;
                    self.cycle = PerEye::default();
                }
            }
            SubmissionEvent::Failed { eye, pose } => self.check_call(eye, pose),
            SubmissionEvent::Skipped { .. } => {}
            SubmissionEvent::Shutdown => {
                self.shutdown = true;
                self.fresh = false;
            }
        }
    }

    /// A compositor call was made for `eye` against `pose`
    fn check_call(&mut self, eye: Eye, pose: PoseSeq) {
        if self.shutdown {
            self.violations.push(Violation::SubmitAfterShutdown { eye });
            return;
        }
        if !self.fresh {
            self.violations.push(Violation::SubmitWhileStale { eye });
        }
        if self.latest != Some(pose) {
            self.violations.push(Violation::WrongPose {
                eye,
                expected: self.latest,
                got: pose,
            });
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn events(&self) -> u64 {
        self.events
    }
}
