//! HMD Session - runtime lifecycle around the stereo submitter

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use kvr_core::{
    ColorSpace, Eye, EyeTexture, PoseSeq, PoseSnapshot, RenderTargetSize, TextureHandle,
    TextureType,
};
use kvr_sync::{ClockStats, Compositor, StereoSubmitter, SubmitError, SubmitOutcome};

use crate::{
    HealthVerdict, SessionConfig, SessionError, SessionHealth, SessionResult, Tracking, VrRuntime,
};

/// Session output state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Tracking and submitting
    Running,
    /// Output turned off by the user or by tracking failures
    Disabled,
    /// Output stopped after repeated compositor failures
    Degraded,
    /// Torn down; permanent
    ShutDown,
}

impl SessionState {
    #[inline]
    pub fn is_active(self) -> bool {
        self == SessionState::Running
    }
}

/// Session counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub poses: u64,
    pub tracking_failures: u64,
    pub submits: u64,
    pub skips: u64,
    pub submit_failures: u64,
    pub degradations: u64,
}

/// Result of one tracking tick
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// A pose was acquired and the clock armed
    Pose { seq: PoseSeq, snapshot: PoseSnapshot },
    /// Session not running; tracking not polled
    Inactive(SessionState),
}

/// Result of one eye render callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Frame(SubmitOutcome),
    /// Session not running; nothing submitted
    Inactive(SessionState),
}

/// Point-in-time view for a status indicator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub enabled: bool,
    pub render_target: RenderTargetSize,
    pub texture_type: TextureType,
    pub stats: SessionStats,
    pub clock: ClockStats,
}

struct Control {
    state: SessionState,
    health: SessionHealth,
    stats: SessionStats,
    tracking_failures: u32,
}

/// A running HMD session.
///
/// `tick` belongs to the engine's update loop, `render_eye` to each eye's
/// render callback; they may run on different threads.
pub struct HmdSession<T: Tracking, C: Compositor> {
    config: SessionConfig,
    runtime: Arc<dyn VrRuntime>,
    tracking: Mutex<T>,
    stereo: StereoSubmitter<C>,
    texture_type: TextureType,
    color_space: ColorSpace,
    render_target: RenderTargetSize,
    control: Mutex<Control>,
}

impl<T: Tracking, C: Compositor> HmdSession<T, C> {
    /// Probe the runtime, initialize it and build the session.
    pub fn initialize<R: VrRuntime + 'static>(
        runtime: Arc<R>,
        tracking: T,
        compositor: Arc<C>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        config.validate()?;

        if !runtime.is_hmd_present() {
            warn!("HMD not found on this system");
            return Err(SessionError::HmdNotFound);
        }
        if !runtime.is_runtime_installed() {
            warn!("VR runtime not found on this system");
            return Err(SessionError::RuntimeNotInstalled);
        }

        let texture_type = config
            .graphics_api
            .texture_type()
            .ok_or(SessionError::UnsupportedGraphicsApi(config.graphics_api))?;

        runtime.init().map_err(|e| {
            warn!("VR runtime init failed: {}", e);
            SessionError::InitFailed(e)
        })?;
        info!("VR runtime initialized");

        let render_target = config
            .render_target_override
            .unwrap_or_else(|| runtime.recommended_render_target_size());
        if render_target.is_empty() {
            runtime.shutdown();
            return Err(SessionError::InvalidRenderTarget(render_target));
        }
        info!(%render_target, ?texture_type, "eye render targets configured");

        let state = if config.start_enabled {
            SessionState::Running
        } else {
            SessionState::Disabled
        };

        let session = HmdSession {
            runtime,
            tracking: Mutex::new(tracking),
            stereo: StereoSubmitter::new(compositor),
            texture_type,
            color_space: config.color_space,
            render_target,
            control: Mutex::new(Control {
                state,
                health: SessionHealth::new(config.max_consecutive_failures),
                stats: SessionStats::default(),
                tracking_failures: 0,
            }),
            config,
        };

        info!(?state, "HMD session ready");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.control.lock().state
    }

    pub fn is_enabled(&self) -> bool {
        self.state().is_active()
    }

    pub fn render_target(&self) -> RenderTargetSize {
        self.render_target
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stereo(&self) -> &StereoSubmitter<C> {
        &self.stereo
    }

    /// Turn output on or off. Re-enabling clears failure history.
    /// Has no effect after shutdown.
    pub fn set_enabled(&self, enabled: bool) {
        let mut control = self.control.lock();
        let next = match (control.state, enabled) {
            (SessionState::ShutDown, _) => return,
            (_, true) => SessionState::Running,
            (_, false) => SessionState::Disabled,
        };
        if next == SessionState::Running && control.state != SessionState::Running {
            control.health.reset();
            self.stereo.reset_failures();
            control.tracking_failures = 0;
        }
        control.state = next;
        info!(enabled, "HMD output toggled");
    }

    /// Flip output on/off; returns whether output is now enabled
    pub fn toggle_enabled(&self) -> bool {
        let enable = !self.is_enabled();
        self.set_enabled(enable);
        self.is_enabled()
    }

    /// Make the current headset position the seated origin
    pub fn reset_seated_pose(&self) {
        if self.state() == SessionState::ShutDown {
            return;
        }
        self.tracking.lock().reset_seated_zero_pose();
        info!("seated pose reset");
    }

    /// Engine tick: poll tracking and arm the pose clock.
    pub fn tick(&self) -> SessionResult<TickOutcome> {
        let state = {
            let mut control = self.control.lock();
            control.stats.ticks += 1;
            control.state
        };
        if !state.is_active() {
            return Ok(TickOutcome::Inactive(state));
        }

        // May block until the compositor's pose deadline
        let polled = self.tracking.lock().wait_get_poses();

        let mut control = self.control.lock();
        match polled {
            // Output may have been turned off while the poll was blocked
            Ok(_) if !control.state.is_active() => Ok(TickOutcome::Inactive(control.state)),
            Ok(snapshot) => {
                control.tracking_failures = 0;
                match self.stereo.mark_pose_fresh() {
                    Some(seq) => {
                        control.stats.poses += 1;
                        Ok(TickOutcome::Pose { seq, snapshot })
                    }
                    None => Ok(TickOutcome::Inactive(SessionState::ShutDown)),
                }
            }
            Err(err) => {
                control.stats.tracking_failures += 1;
                control.tracking_failures += 1;
                warn!(
                    failures = control.tracking_failures,
                    "tracking poll failed: {}",
                    err
                );
                if control.tracking_failures >= self.config.max_tracking_failures
                    && control.state == SessionState::Running
                {
                    control.state = SessionState::Disabled;
                    warn!("HMD output disabled after tracking failures");
                }
                Err(SessionError::Tracking(err))
            }
        }
    }

    /// Eye render callback: forward this frame's buffer to the eye's submitter.
    pub fn render_eye(&self, eye: Eye, handle: TextureHandle) -> SessionResult<RenderOutcome> {
        let state = self.state();
        if !state.is_active() {
            return Ok(RenderOutcome::Inactive(state));
        }

        let texture = EyeTexture::new(handle, self.texture_type).with_color_space(self.color_space);
        let result = self.stereo.on_frame_rendered(eye, &texture);

        let mut control = self.control.lock();
        match result {
            Ok(outcome) => {
                if outcome.is_submitted() {
                    control.stats.submits += 1;
                    control.health.record_success(eye);
                } else {
                    control.stats.skips += 1;
                }
                Ok(RenderOutcome::Frame(outcome))
            }
            Err(err) => {
                control.stats.submit_failures += 1;
                let verdict = match err {
                    SubmitError::Compositor { source, .. } => {
                        control.health.record_failure(eye, source)
                    }
                };
                if let HealthVerdict::Degraded { eye, failures } = verdict {
                    if control.state == SessionState::Running {
                        control.state = SessionState::Degraded;
                        control.stats.degradations += 1;
                        warn!(%eye, failures, "HMD output degraded after repeated submit failures");
                    }
                }
                Err(SessionError::Submit(err))
            }
        }
    }

    /// Tear the session down. Later ticks and renders are inert.
    pub fn shutdown(&self) {
        {
            let mut control = self.control.lock();
            if control.state == SessionState::ShutDown {
                return;
            }
            control.state = SessionState::ShutDown;
            self.stereo.shutdown();
            debug!(stats = ?control.stats, "final session stats");
        }
        self.runtime.shutdown();
        info!("HMD session shut down");
    }

    pub fn status(&self) -> SessionStatus {
        let control = self.control.lock();
        SessionStatus {
            state: control.state,
            enabled: control.state.is_active(),
            render_target: self.render_target,
            texture_type: self.texture_type,
            stats: control.stats.clone(),
            clock: self.stereo.clock_stats(),
        }
    }
}

impl<T: Tracking, C: Compositor> Drop for HmdSession<T, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
