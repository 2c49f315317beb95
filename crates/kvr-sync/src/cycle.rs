//! Stereo cycle state machine
//!
//! `Idle` -> (mark) -> `Armed` -> (one eye) -> `OneSubmitted` -> (other eye) -> `Idle`
//!
//! This is the unlocked core: every method is a plain transition on
//! `&mut self`. [`crate::PoseClock`] puts it behind a lock.

use std::fmt;

use kvr_core::{Eye, PerEye, PoseSeq};

/// Per-eye progress within the current cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EyeSlot {
    /// Nothing submitted for the current pose
    #[default]
    Idle,
    /// A compositor call for this pose is running outside the lock
    InFlight(PoseSeq),
    /// Submitted for this pose, waiting for the other eye
    Submitted(PoseSeq),
}

/// Where the current cycle stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Armed,
    OneSubmitted(Eye),
    ShutDown,
}

/// Why a render callback did not submit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No pose acquired since the last completed cycle
    NotFresh,
    /// This eye already submitted for the current pose
    AlreadySubmitted,
    /// This eye has a submit call running
    InFlight,
    /// The session is gone
    Shutdown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotFresh => "pose not fresh",
            SkipReason::AlreadySubmitted => "already submitted this cycle",
            SkipReason::InFlight => "submission in flight",
            SkipReason::Shutdown => "shut down",
        };
        f.write_str(s)
    }
}

/// Permission for one eye to submit against one pose.
/// Must be handed back through `complete` or `release`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a claim blocks its eye until completed or released"]
pub struct EyeClaim {
    eye: Eye,
    pose: PoseSeq,
}

impl EyeClaim {
    #[inline]
    pub fn eye(&self) -> Eye {
        self.eye
    }

    #[inline]
    pub fn pose(&self) -> PoseSeq {
        self.pose
    }
}

/// Result of recording a submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleProgress {
    /// Recorded; the other eye has not submitted yet
    Pending,
    /// Both eyes submitted for this pose; the clock is stale again
    Completed(PoseSeq),
    /// Not recorded: stale pose, no fresh pose, or shut down
    Ignored,
}

impl CycleProgress {
    #[inline]
    pub fn is_completed(self) -> bool {
        matches!(self, CycleProgress::Completed(_))
    }
}

/// Counters kept across cycles
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockStats {
    /// Poses accepted by `arm`
    pub poses_marked: u64,
    /// Poses replaced by a newer one before their cycle completed
    pub poses_superseded: u64,
    /// Cycles where both eyes submitted
    pub cycles_completed: u64,
    /// Cycles dropped with exactly one eye submitted
    pub cycles_abandoned: u64,
    /// Completions that arrived for a pose no longer current
    pub stale_completions: u64,
}

/// State of the current stereo cycle
#[derive(Clone, Debug, Default)]
pub struct CycleState {
    fresh: bool,
    shutdown: bool,
    /// Latest accepted pose
    pose: PoseSeq,
    slots: PerEye<EyeSlot>,
    stats: ClockStats,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.fresh && !self.shutdown
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Pose the current cycle submits against, if armed
    pub fn current_pose(&self) -> Option<PoseSeq> {
        self.is_fresh().then_some(self.pose)
    }

    pub fn slot(&self, eye: Eye) -> EyeSlot {
        *self.slots.get(eye)
    }

    pub fn phase(&self) -> CyclePhase {
        if self.shutdown {
            return CyclePhase::ShutDown;
        }
        if !self.fresh {
            return CyclePhase::Idle;
        }
        match (self.slots.left, self.slots.right) {
            (EyeSlot::Submitted(_), _) => CyclePhase::OneSubmitted(Eye::Left),
            (_, EyeSlot::Submitted(_)) => CyclePhase::OneSubmitted(Eye::Right),
            _ => CyclePhase::Armed,
        }
    }

    pub fn stats(&self) -> &ClockStats {
        &self.stats
    }

    /// Accept a new tracking pose and arm the cycle.
    ///
    /// A pose that is still fresh is superseded. If one eye already
    /// submitted for it, that half cycle is abandoned so both eyes pair on
    /// the new pose. Returns `None` after shutdown.
    pub fn arm(&mut self) -> Option<PoseSeq> {
        if self.shutdown {
            return None;
        }

        if self.fresh {
            self.stats.poses_superseded += 1;
            let half_done = Eye::BOTH
                .iter()
                .any(|&eye| matches!(self.slots.get(eye), EyeSlot::Submitted(_)));
            if half_done {
                self.stats.cycles_abandoned += 1;
            }
        }

        // In-flight claims keep their slot; their completion will be stale.
        for eye in Eye::BOTH {
            let slot = self.slots.get_mut(eye);
            if matches!(slot, EyeSlot::Submitted(_)) {
                *slot = EyeSlot::Idle;
            }
        }

        self.pose = self.pose.next();
        self.fresh = true;
        self.stats.poses_marked += 1;
        Some(self.pose)
    }

    /// Check the submit precondition for `eye` and take the slot.
    pub fn try_claim(&mut self, eye: Eye) -> Result<EyeClaim, SkipReason> {
        if self.shutdown {
            return Err(SkipReason::Shutdown);
        }
        if !self.fresh {
            return Err(SkipReason::NotFresh);
        }

        let pose = self.pose;
        let slot = self.slots.get_mut(eye);
        match *slot {
            EyeSlot::InFlight(_) => Err(SkipReason::InFlight),
            EyeSlot::Submitted(_) => Err(SkipReason::AlreadySubmitted),
            EyeSlot::Idle => {
                *slot = EyeSlot::InFlight(pose);
                Ok(EyeClaim { eye, pose })
            }
        }
    }

    /// Record a successful compositor call made under `claim`.
    pub fn complete(&mut self, claim: EyeClaim) -> CycleProgress {
        let slot = self.slots.get_mut(claim.eye);
        if *slot != EyeSlot::InFlight(claim.pose) {
            return CycleProgress::Ignored;
        }

        if self.shutdown {
            *slot = EyeSlot::Idle;
            return CycleProgress::Ignored;
        }

        if !self.fresh || claim.pose != self.pose {
            *slot = EyeSlot::Idle;
            self.stats.stale_completions += 1;
            return CycleProgress::Ignored;
        }

        *slot = EyeSlot::Submitted(claim.pose);
        self.settle()
    }

    /// Give back a claim whose compositor call failed.
    /// Freshness is untouched so the eye retries with the same pose.
    pub fn release(&mut self, claim: EyeClaim) {
        let slot = self.slots.get_mut(claim.eye);
        if *slot == EyeSlot::InFlight(claim.pose) {
            *slot = EyeSlot::Idle;
        }
    }

    /// Record that `eye` submitted for the current pose without a claim.
    pub fn notify_eye_submitted(&mut self, eye: Eye) -> CycleProgress {
        if !self.is_fresh() {
            return CycleProgress::Ignored;
        }
        *self.slots.get_mut(eye) = EyeSlot::Submitted(self.pose);
        self.settle()
    }

    /// Make the state permanently stale. Returns `false` if already shut down.
    pub fn shutdown(&mut self) -> bool {
        let first = !self.shutdown;
        self.shutdown = true;
        self.fresh = false;
        first
    }

    /// Close the cycle once both eyes hold the current pose.
    fn settle(&mut self) -> CycleProgress {
        let pose = self.pose;
        let both = self.slots.left == EyeSlot::Submitted(pose)
            && self.slots.right == EyeSlot::Submitted(pose);
        if !both {
            return CycleProgress::Pending;
        }

        self.fresh = false;
        self.slots = PerEye::default();
        self.stats.cycles_completed += 1;
        CycleProgress::Completed(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_refuses_claims() {
        let mut state = CycleState::new();
        assert_eq!(state.phase(), CyclePhase::Idle);
        assert_eq!(state.try_claim(Eye::Left), Err(SkipReason::NotFresh));
    }

    #[test]
    fn test_full_cycle() {
        let mut state = CycleState::new();
        let pose = state.arm().unwrap();
        assert_eq!(state.phase(), CyclePhase::Armed);

        let left = state.try_claim(Eye::Left).unwrap();
        assert_eq!(left.pose(), pose);
        assert_eq!(state.complete(left), CycleProgress::Pending);
        assert_eq!(state.phase(), CyclePhase::OneSubmitted(Eye::Left));

        let right = state.try_claim(Eye::Right).unwrap();
        assert_eq!(state.complete(right), CycleProgress::Completed(pose));

        assert!(!state.is_fresh());
        assert_eq!(state.phase(), CyclePhase::Idle);
        assert_eq!(state.stats().cycles_completed, 1);
    }

    #[test]
    fn test_second_claim_same_eye() {
        let mut state = CycleState::new();
        state.arm();

        let claim = state.try_claim(Eye::Right).unwrap();
        assert_eq!(state.try_claim(Eye::Right), Err(SkipReason::InFlight));

        state.complete(claim);
        assert_eq!(state.try_claim(Eye::Right), Err(SkipReason::AlreadySubmitted));
    }

    #[test]
    fn test_release_keeps_pose_fresh() {
        let mut state = CycleState::new();
        let pose = state.arm().unwrap();

        let claim = state.try_claim(Eye::Left).unwrap();
        state.release(claim);

        assert!(state.is_fresh());
        let retry = state.try_claim(Eye::Left).unwrap();
        assert_eq!(retry.pose(), pose);
    }

    #[test]
    fn test_rearm_abandons_half_cycle() {
        let mut state = CycleState::new();
        let first = state.arm().unwrap();

        let left = state.try_claim(Eye::Left).unwrap();
        state.complete(left);

        let second = state.arm().unwrap();
        assert!(second > first);
        assert_eq!(state.slot(Eye::Left), EyeSlot::Idle);
        assert_eq!(state.stats().poses_superseded, 1);
        assert_eq!(state.stats().cycles_abandoned, 1);

        // Left must pair with Right on the new pose
        let left = state.try_claim(Eye::Left).unwrap();
        assert_eq!(left.pose(), second);
    }

    #[test]
    fn test_stale_completion_ignored() {
        let mut state = CycleState::new();
        state.arm();
        let old = state.try_claim(Eye::Left).unwrap();

        let newer = state.arm().unwrap();
        // Still in flight for the old pose
        assert_eq!(state.try_claim(Eye::Left), Err(SkipReason::InFlight));

        assert_eq!(state.complete(old), CycleProgress::Ignored);
        assert_eq!(state.stats().stale_completions, 1);

        let left = state.try_claim(Eye::Left).unwrap();
        assert_eq!(left.pose(), newer);
    }

    #[test]
    fn test_shutdown_is_permanent() {
        let mut state = CycleState::new();
        state.arm();
        let claim = state.try_claim(Eye::Left).unwrap();

        assert!(state.shutdown());
        assert!(!state.shutdown());
        assert_eq!(state.complete(claim), CycleProgress::Ignored);
        assert_eq!(state.arm(), None);
        assert!(!state.is_fresh());
        assert_eq!(state.try_claim(Eye::Right), Err(SkipReason::Shutdown));
        assert_eq!(state.phase(), CyclePhase::ShutDown);
    }

    #[test]
    fn test_notify_without_claim() {
        let mut state = CycleState::new();
        assert_eq!(state.notify_eye_submitted(Eye::Left), CycleProgress::Ignored);

        let pose = state.arm().unwrap();
        assert_eq!(state.notify_eye_submitted(Eye::Right), CycleProgress::Pending);
        assert_eq!(
            state.notify_eye_submitted(Eye::Left),
            CycleProgress::Completed(pose)
        );
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        #[derive(Clone, Copy, Debug)]
        enum Op {
            Arm,
            Claim(Eye),
            Complete(Eye),
            Release(Eye),
            Shutdown,
        }

        fn op() -> impl Strategy<Value = Op> {
            let eye = prop_oneof![Just(Eye::Left), Just(Eye::Right)];
            prop_oneof![
                3 => Just(Op::Arm),
                4 => eye.clone().prop_map(Op::Claim),
                4 => eye.clone().prop_map(Op::Complete),
                1 => eye.prop_map(Op::Release),
                1 => Just(Op::Shutdown),
            ]
        }

        proptest! {
            /// Claims held open across other operations model the
            /// compositor call running outside the lock.
            #[test]
            fn prop_interleaved_claims_pair_on_one_pose(ops in prop::collection::vec(op(), 0..300)) {
                let mut state = CycleState::new();
                let mut held: PerEye<Option<EyeClaim>> = PerEye::default();
                let mut recorded: PerEye<Option<PoseSeq>> = PerEye::default();
                let mut window: PerEye<u32> = PerEye::default();

                for op in ops {
                    match op {
                        Op::Arm => {
                            if state.arm().is_some() {
                                recorded = PerEye::default();
                                window = PerEye::default();
                            }
                        }
                        Op::Claim(eye) => {
                            if held.get(eye).is_none() {
                                if let Ok(claim) = state.try_claim(eye) {
                                    prop_assert_eq!(Some(claim.pose()), state.current_pose());
                                    *held.get_mut(eye) = Some(claim);
                                }
                            } else {
                                prop_assert!(state.try_claim(eye).is_err());
                            }
                        }
                        Op::Complete(eye) => {
                            if let Some(claim) = held.get_mut(eye).take() {
                                let pose = claim.pose();
                                match state.complete(claim) {
                                    CycleProgress::Pending => {
                                        *recorded.get_mut(eye) = Some(pose);
                                        *window.get_mut(eye) += 1;
                                    }
                                    CycleProgress::Completed(done) => {
                                        prop_assert_eq!(done, pose);
                                        prop_assert_eq!(*recorded.get(eye.other()), Some(pose));
                                        *window.get_mut(eye) += 1;
                                        recorded = PerEye::default();
                                        prop_assert!(!state.is_fresh());
                                    }
                                    CycleProgress::Ignored => {}
                                }
                                prop_assert!(*window.get(eye) <= 1);
                            }
                        }
                        Op::Release(eye) => {
                            if let Some(claim) = held.get_mut(eye).take() {
                                let fresh = state.is_fresh();
                                state.release(claim);
                                prop_assert_eq!(state.is_fresh(), fresh);
                            }
                        }
                        Op::Shutdown => {
                            state.shutdown();
                        }
                    }

                    for eye in Eye::BOTH {
                        let in_flight = matches!(state.slot(eye), EyeSlot::InFlight(_));
                        prop_assert_eq!(in_flight, held.get(eye).is_some());
                    }
                    if state.is_shutdown() {
                        prop_assert!(!state.is_fresh());
                    }
                }
            }
        }
    }
}
