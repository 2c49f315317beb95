//! Cadence Simulator - deterministic tracking vs. render rate simulation
//!
//! Simulates:
//! - A tracking loop and two eye render loops at independent rates
//! - Per-frame timing jitter
//! - Random compositor failures
//! - Session degradation and recovery under failure

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use kvr_core::{Eye, PerEye, TextureHandle};
use kvr_runtime::{
    HmdSession, RenderOutcome, SessionConfig, SessionError, SessionState, SessionStats,
    TickOutcome,
};
use kvr_sync::ClockStats;

use crate::checker::{PairingChecker, SubmissionEvent, Violation};
use crate::mock::{FlakyCompositor, HeadlessRuntime, ScriptedTracking};

/// Frame rate of one simulated loop
#[derive(Clone, Copy, Debug)]
pub struct Cadence {
    /// Nominal rate (frames per second)
    pub hz: f64,
    /// Random jitter per frame (microseconds)
    pub jitter_us: u32,
}

impl Cadence {
    pub fn new(hz: f64, jitter_us: u32) -> Self {
        Cadence { hz, jitter_us }
    }

    /// Steady loop with no jitter
    pub fn steady(hz: f64) -> Self {
        Self::new(hz, 0)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.hz.max(1.0))
    }

    /// Time until the next frame
    pub fn next_interval(&self, rng: &mut StdRng) -> Duration {
        let base_us = self.period().as_micros() as i64;
        let jitter = if self.jitter_us > 0 {
            rng.gen_range(-(self.jitter_us as i64)..=self.jitter_us as i64)
        } else {
            0
        };
        Duration::from_micros((base_us + jitter).max(1) as u64)
    }
}

/// Simulation scenario parameters
#[derive(Clone, Debug)]
pub struct CadenceConfig {
    pub tracking: Cadence,
    pub render: PerEye<Cadence>,
    /// Fraction of compositor calls that fail
    pub failure_rate: f64,
    /// Degradation threshold handed to the session
    pub max_consecutive_failures: u32,
    /// Re-enable the session whenever it degrades
    pub auto_recover: bool,
    pub seed: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self::matched()
    }
}

impl CadenceConfig {
    /// Tracking and both eyes at 90 Hz
    pub fn matched() -> Self {
        CadenceConfig {
            tracking: Cadence::steady(90.0),
            render: PerEye::new(Cadence::steady(90.0), Cadence::steady(90.0)),
            failure_rate: 0.0,
            max_consecutive_failures: 90,
            auto_recover: false,
            seed: 1,
        }
    }

    /// Eyes render faster than tracking delivers poses
    pub fn fast_render() -> Self {
        CadenceConfig {
            render: PerEye::new(Cadence::new(144.0, 200), Cadence::new(144.0, 200)),
            ..Self::matched()
        }
    }

    /// Eyes render at half the tracking rate
    pub fn slow_render() -> Self {
        CadenceConfig {
            render: PerEye::new(Cadence::new(45.0, 200), Cadence::new(45.0, 200)),
            ..Self::matched()
        }
    }

    /// One eye lags the other
    pub fn lopsided() -> Self {
        CadenceConfig {
            render: PerEye::new(Cadence::new(90.0, 100), Cadence::new(60.0, 100)),
            ..Self::matched()
        }
    }

    /// High jitter on every loop
    pub fn jittery() -> Self {
        CadenceConfig {
            tracking: Cadence::new(90.0, 3000),
            render: PerEye::new(Cadence::new(90.0, 3000), Cadence::new(90.0, 3000)),
            ..Self::matched()
        }
    }

    /// Frequent compositor failures, session recovers when degraded
    pub fn flaky() -> Self {
        CadenceConfig {
            failure_rate: 0.2,
            max_consecutive_failures: 3,
            auto_recover: true,
            ..Self::jittery()
        }
    }
}

/// Simulation result and statistics
#[derive(Debug, Default)]
pub struct SimulationReport {
    pub duration: Duration,
    pub tracking_frames: u64,
    pub render_frames: PerEye<u64>,
    pub submits: PerEye<u64>,
    pub failures: PerEye<u64>,
    pub cycles_completed: u64,
    pub recoveries: u64,
    pub violations: Vec<Violation>,
    pub session: SessionStats,
    pub clock: ClockStats,
    pub final_state: Option<SessionState>,
}

impl SimulationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Completed cycles per tracked pose
    pub fn completion_ratio(&self) -> f64 {
        if self.tracking_frames == 0 {
            return 0.0;
        }
        self.cycles_completed as f64 / self.tracking_frames as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Tracking,
    Render(Eye),
}

/// Discrete-event simulation of one HMD session
pub struct CadenceSimulator {
    config: CadenceConfig,
    session: HmdSession<ScriptedTracking, FlakyCompositor>,
    runtime: Arc<HeadlessRuntime>,
    checker: PairingChecker,
    rng: StdRng,
    now: Duration,
    next: [(Source, Duration); 3],
    frame_counter: u64,
}

impl CadenceSimulator {
    pub fn new(config: CadenceConfig) -> Result<Self, SessionError> {
        let compositor = FlakyCompositor::new(config.failure_rate, config.seed.wrapping_add(1));
        let session_config = SessionConfig {
            start_enabled: true,
            max_consecutive_failures: config.max_consecutive_failures,
            ..SessionConfig::default()
        };
        let runtime = Arc::new(HeadlessRuntime::default());
        let session = HmdSession::initialize(
            Arc::clone(&runtime),
            ScriptedTracking::new(),
            Arc::new(compositor),
            session_config,
        )?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let next = [
            (Source::Tracking, Duration::ZERO),
            (Source::Render(Eye::Left), config.render.left.next_interval(&mut rng)),
            (Source::Render(Eye::Right), config.render.right.next_interval(&mut rng)),
        ];

        Ok(CadenceSimulator {
            config,
            session,
            runtime,
            checker: PairingChecker::new(),
            rng,
            now: Duration::ZERO,
            next,
            frame_counter: 0,
        })
    }

    pub fn session(&self) -> &HmdSession<ScriptedTracking, FlakyCompositor> {
        &self.session
    }

    pub fn runtime(&self) -> &HeadlessRuntime {
        &self.runtime
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run until simulated time reaches `duration`
    pub fn run(&mut self, duration: Duration) -> SimulationReport {
        let mut report = SimulationReport::default();
        let end = self.now + duration;

        loop {
            let (index, at) = self.earliest();
            if at > end {
                break;
            }
            self.now = at;
            let source = self.next[index].0;
            self.step(source, &mut report);

            let interval = match source {
                Source::Tracking => self.config.tracking.next_interval(&mut self.rng),
                Source::Render(eye) => self.config.render.get(eye).next_interval(&mut self.rng),
            };
            self.next[index].1 = at + interval;
        }

        self.finish(duration, report)
    }

    /// Run, then shut the session down and probe both eyes once more
    pub fn run_then_shutdown(&mut self, duration: Duration) -> SimulationReport {
        let mut report = self.run(duration);

        self.session.shutdown();
        self.checker.record(SubmissionEvent::Shutdown);
        for eye in Eye::BOTH {
            self.step(Source::Render(eye), &mut report);
        }

        let duration = report.duration;
        self.finish(duration, report)
    }

    fn earliest(&self) -> (usize, Duration) {
        let mut best = 0;
        for (i, (_, at)) in self.next.iter().enumerate() {
            if *at < self.next[best].1 {
                best = i;
            }
        }
        (best, self.next[best].1)
    }

    fn step(&mut self, source: Source, report: &mut SimulationReport) {
        match source {
            Source::Tracking => {
                report.tracking_frames += 1;
                if let Ok(TickOutcome::Pose { seq, .. }) = self.session.tick() {
                    self.checker.record(SubmissionEvent::Marked(seq));
                }
            }
            Source::Render(eye) => {
                *report.render_frames.get_mut(eye) += 1;
                self.frame_counter += 1;
                let handle = TextureHandle::new(self.frame_counter);

                match self.session.render_eye(eye, handle) {
                    Ok(RenderOutcome::Frame(outcome)) => {
                        if outcome.is_submitted() {
                            *report.submits.get_mut(eye) += 1;
                        }
                        self.checker
                            .record(SubmissionEvent::from_result(eye, &Ok(outcome)));
                    }
                    Ok(RenderOutcome::Inactive(SessionState::Degraded)) if self.config.auto_recover => {
                        debug!(%eye, at = ?self.now, "re-enabling degraded session");
                        self.session.set_enabled(true);
                        report.recoveries += 1;
                    }
                    Ok(RenderOutcome::Inactive(_)) => {}
                    Err(SessionError::Submit(err)) => {
                        *report.failures.get_mut(eye) += 1;
                        self.checker.record(SubmissionEvent::from_result(eye, &Err(err)));
                    }
                    Err(_) => {}
                }
            }
        }
    }

    fn finish(&self, duration: Duration, mut report: SimulationReport) -> SimulationReport {
        let status = self.session.status();
        report.duration = duration;
        report.cycles_completed = self.checker.cycles_completed();
        report.violations = self.checker.violations().to_vec();
        report.session = status.stats;
        report.clock = status.clock;
        report.final_state = Some(status.state);
        report
    }
}

/// Predefined scenarios
pub mod scenarios {
    use super::*;

    pub fn run(config: CadenceConfig, duration: Duration) -> Result<SimulationReport, SessionError> {
        let mut sim = CadenceSimulator::new(config)?;
        Ok(sim.run(duration))
    }

    /// Same scenario under several seeds
    pub fn sweep(
        config: CadenceConfig,
        seeds: impl IntoIterator<Item = u64>,
        duration: Duration,
    ) -> Result<Vec<SimulationReport>, SessionError> {
        seeds
            .into_iter()
            .map(|seed| run(CadenceConfig { seed, ..config.clone() }, duration))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_rates_complete_most_cycles() {
        let report = scenarios::run(CadenceConfig::matched(), Duration::from_secs(5)).unwrap();

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert!(report.tracking_frames >= 450);
        // Steady, equal rates: every pose is eventually paired
        assert!(report.completion_ratio() > 0.95, "ratio {}", report.completion_ratio());
        assert_eq!(report.clock.cycles_completed, report.cycles_completed);
    }

    #[test]
    fn test_fast_render_never_double_submits() {
        let report = scenarios::run(CadenceConfig::fast_render(), Duration::from_secs(5)).unwrap();

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        // More frames than poses, but at most one submit per eye per pose
        for eye in Eye::BOTH {
            assert!(*report.render_frames.get(eye) > report.tracking_frames);
            assert!(*report.submits.get(eye) <= report.tracking_frames);
        }
    }

    #[test]
    fn test_slow_render_supersedes_poses() {
        let report = scenarios::run(CadenceConfig::slow_render(), Duration::from_secs(5)).unwrap();

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert!(report.clock.poses_superseded > 0);
        assert!(report.cycles_completed < report.tracking_frames);
        assert!(report.cycles_completed > 0);
    }

    #[test]
    fn test_lopsided_eyes_stay_paired() {
        let report = scenarios::run(CadenceConfig::lopsided(), Duration::from_secs(5)).unwrap();

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert!(report.cycles_completed > 0);
        // The faster eye cannot run ahead of completed pairs by more than
        // one half cycle per pose
        let left = *report.submits.get(Eye::Left);
        assert!(left <= report.tracking_frames);
    }

    #[test]
    fn test_jitter_sweep_is_clean() {
        let reports =
            scenarios::sweep(CadenceConfig::jittery(), 1..=8, Duration::from_secs(2)).unwrap();
        for report in reports {
            assert!(report.is_clean(), "violations: {:?}", report.violations);
            assert_eq!(report.final_state, Some(SessionState::Running));
        }
    }

    #[test]
    fn test_flaky_compositor_degrades_and_recovers() {
        let report = scenarios::run(CadenceConfig::flaky(), Duration::from_secs(10)).unwrap();

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        let failures = report.failures.left + report.failures.right;
        assert!(failures > 0);
        assert_eq!(report.session.submit_failures, failures);
        // The run may end between a degradation and its recovery
        assert!(report.recoveries <= report.session.degradations);
        assert!(report.session.degradations <= report.recoveries + 1);
        assert!(report.cycles_completed > 0);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = scenarios::run(CadenceConfig::flaky(), Duration::from_secs(2)).unwrap();
        let b = scenarios::run(CadenceConfig::flaky(), Duration::from_secs(2)).unwrap();

        assert_eq!(a.submits, b.submits);
        assert_eq!(a.failures, b.failures);
        assert_eq!(a.cycles_completed, b.cycles_completed);
    }

    #[test]
    fn test_shutdown_stops_submission() {
        let mut sim = CadenceSimulator::new(CadenceConfig::matched()).unwrap();
        let report = sim.run_then_shutdown(Duration::from_secs(1));

        assert!(report.is_clean(), "violations: {:?}", report.violations);
        assert_eq!(report.final_state, Some(SessionState::ShutDown));
        assert!(!sim.session().stereo().is_fresh());
        assert_eq!(sim.runtime().shutdown_calls(), 1);

        let calls = sim.session().status().stats.submits;
        let after = sim.run(Duration::from_secs(1));
        assert_eq!(after.session.submits, calls);
        assert_eq!(after.submits, PerEye::default());
    }
}
