//! Submit health policy
//!
//! The submitter stalls a failing eye and retries forever. This policy
//! decides when a run of failures means the session should stop trying.

use kvr_core::{CompositorError, Eye, PerEye};

/// Verdict after recording a submit result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// An eye reached the failure threshold
    Degraded { eye: Eye, failures: u32 },
}

/// Consecutive failure tracking per eye
#[derive(Clone, Debug)]
pub struct SessionHealth {
    threshold: u32,
    failures: PerEye<u32>,
    last_error: Option<(Eye, CompositorError)>,
}

impl SessionHealth {
    pub fn new(threshold: u32) -> Self {
        SessionHealth {
            threshold: threshold.max(1),
            failures: PerEye::default(),
            last_error: None,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_success(&mut self, eye: Eye) {
        *self.failures.get_mut(eye) = 0;
    }

    pub fn record_failure(&mut self, eye: Eye, error: CompositorError) -> HealthVerdict {
        let count = self.failures.get_mut(eye);
        *count = count.saturating_add(1);
        self.last_error = Some((eye, error));

        if *count >= self.threshold {
            HealthVerdict::Degraded { eye, failures: *count }
        } else {
            HealthVerdict::Healthy
        }
    }

    pub fn failures(&self, eye: Eye) -> u32 {
        *self.failures.get(eye)
    }

    pub fn last_error(&self) -> Option<(Eye, CompositorError)> {
        self.last_error
    }

    /// Forget past failures (on re-enable)
    pub fn reset(&mut self) {
        self.failures = PerEye::default();
        self.last_error = None;
    }
}
