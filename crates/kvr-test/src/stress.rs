//! Threaded stress runs
//!
//! One tracking thread marks poses while two eye threads render as fast as
//! they can. Thread interleaving is not observable as a single history, so
//! the checks here are order independent:
//! - Each eye's successful submits carry strictly increasing poses
//! - Every completed pose was submitted by both eyes
//! - No compositor call lands after shutdown has drained

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use kvr_core::{Eye, EyeTexture, PerEye, PoseSeq, TextureHandle, TextureType};
use kvr_sync::{CycleProgress, StereoSubmitter, SubmitOutcome};

use crate::mock::FlakyCompositor;

/// Stress run parameters
#[derive(Clone, Debug)]
pub struct StressConfig {
    /// Poses marked by the tracking thread
    pub poses: u64,
    /// Wait for each cycle to complete before marking the next pose
    pub wait_for_pair: bool,
    /// Upper bound on one wait
    pub pair_timeout: Duration,
    pub failure_rate: f64,
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        StressConfig {
            poses: 500,
            wait_for_pair: true,
            pair_timeout: Duration::from_secs(1),
            failure_rate: 0.0,
            seed: 7,
        }
    }
}

impl StressConfig {
    /// Tracking races ahead of the eyes
    pub fn free_running() -> Self {
        StressConfig {
            poses: 5_000,
            wait_for_pair: false,
            ..Self::default()
        }
    }

    /// Paired cycles with compositor failures
    pub fn flaky() -> Self {
        StressConfig {
            failure_rate: 0.1,
            ..Self::default()
        }
    }
}

/// Order-independent check failures
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StressViolation {
    /// An eye submitted a pose not newer than its previous one
    NonIncreasing { eye: Eye, previous: PoseSeq, pose: PoseSeq },
    /// A completed pose is missing from one eye's submits
    UnpairedCompletion { pose: PoseSeq, missing: Eye },
    /// Compositor calls grew after shutdown drained
    CallAfterShutdown { calls_before: usize, calls_after: usize },
}

#[derive(Debug, Default)]
pub struct StressReport {
    pub poses: u64,
    pub submitted: PerEye<Vec<PoseSeq>>,
    pub completed: Vec<PoseSeq>,
    pub failures: PerEye<u64>,
    pub pair_timeouts: u64,
    pub cycles_completed: u64,
    pub violations: Vec<StressViolation>,
}

impl StressReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Default)]
struct EyeLog {
    submitted: Vec<PoseSeq>,
    completed: Vec<PoseSeq>,
    failures: u64,
}

fn eye_loop(
    eye: Eye,
    stereo: Arc<StereoSubmitter<FlakyCompositor>>,
    stop: Arc<AtomicBool>,
) -> EyeLog {
    let mut log = EyeLog::default();
    let mut frame = 0u64;

    while !stop.load(Ordering::Acquire) {
        frame += 1;
        let texture = EyeTexture::new(TextureHandle::new(frame), TextureType::Vulkan);
        match stereo.on_frame_rendered(eye, &texture) {
            Ok(SubmitOutcome::Submitted { pose, progress }) => {
                log.submitted.push(pose);
                if let CycleProgress::Completed(done) = progress {
                    log.completed.push(done);
                }
            }
            Ok(SubmitOutcome::Skipped(_)) => {}
            Err(_) => log.failures += 1,
        }
        thread::yield_now();
    }

    log
}

/// Run the three threads to completion and check the result
pub fn run_stress(config: &StressConfig) -> StressReport {
    let compositor = Arc::new(FlakyCompositor::new(config.failure_rate, config.seed));
    let stereo = Arc::new(StereoSubmitter::new(Arc::clone(&compositor)));
    let stop = Arc::new(AtomicBool::new(false));

    let eyes: Vec<_> = Eye::BOTH
        .iter()
        .map(|&eye| {
            let stereo = Arc::clone(&stereo);
            let stop = Arc::clone(&stop);
            thread::spawn(move || eye_loop(eye, stereo, stop))
        })
        .collect();

    let mut report = StressReport::default();
    for _ in 0..config.poses {
        if stereo.mark_pose_fresh().is_none() {
            break;
        }
        report.poses += 1;

        if config.wait_for_pair {
            let deadline = Instant::now() + config.pair_timeout;
            while stereo.is_fresh() {
                if Instant::now() > deadline {
                    report.pair_timeouts += 1;
                    break;
                }
                thread::yield_now();
            }
        } else {
            thread::yield_now();
        }
    }

    stereo.shutdown();
    stop.store(true, Ordering::Release);

    let mut logs = PerEye::<EyeLog>::default();
    for (eye, handle) in Eye::BOTH.iter().zip(eyes) {
        // A panicking eye thread is a test failure, not a recoverable error
        if let Ok(log) = handle.join() {
            *logs.get_mut(*eye) = log;
        }
    }

    let calls_before = compositor.records().len();
    let texture = EyeTexture::new(TextureHandle::NULL, TextureType::Vulkan);
    for eye in Eye::BOTH {
        let _ = stereo.on_frame_rendered(eye, &texture);
    }
    let calls_after = compositor.records().len();
    if calls_after != calls_before {
        report
            .violations
            .push(StressViolation::CallAfterShutdown { calls_before, calls_after });
    }

    for eye in Eye::BOTH {
        let log = logs.get_mut(eye);
        for pair in log.submitted.windows(2) {
            if pair[1] <= pair[0] {
                report.violations.push(StressViolation::NonIncreasing {
                    eye,
                    previous: pair[0],
                    pose: pair[1],
                });
            }
        }
        *report.failures.get_mut(eye) = log.failures;
        report.completed.append(&mut log.completed);
        *report.submitted.get_mut(eye) = std::mem::take(&mut log.submitted);
    }
    report.completed.sort();

    for &pose in &report.completed {
        for eye in Eye::BOTH {
            if report.submitted.get(eye).binary_search(&pose).is_err() {
                report
                    .violations
                    .push(StressViolation::UnpairedCompletion { pose, missing: eye });
            }
        }
    }

    report.cycles_completed = stereo.clock_stats().cycles_completed;
    debug!(
        poses = report.poses,
        cycles = report.cycles_completed,
        timeouts = report.pair_timeouts,
        "stress run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_stress_completes_every_cycle() {
        let report = run_stress(&StressConfig::default());

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert_eq!(report.pair_timeouts, 0);
        assert_eq!(report.cycles_completed, report.poses);
        assert_eq!(report.completed.len() as u64, report.cycles_completed);
        for eye in Eye::BOTH {
            assert_eq!(report.submitted.get(eye).len() as u64, report.poses);
        }
    }

    #[test]
    fn test_free_running_stress() {
        let report = run_stress(&StressConfig::free_running());

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert_eq!(report.completed.len() as u64, report.cycles_completed);
        for eye in Eye::BOTH {
            assert!(report.submitted.get(eye).len() as u64 <= report.poses);
        }
    }

    #[test]
    fn test_flaky_stress_retries_to_completion() {
        let report = run_stress(&StressConfig::flaky());

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert!(report.failures.left + report.failures.right > 0);
        // Failed eyes retry the same pose, so every cycle still pairs
        assert_eq!(report.pair_timeouts, 0);
        assert_eq!(report.cycles_completed, report.poses);
    }
}
