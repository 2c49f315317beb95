//! Compositor, tracking and runtime doubles

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kvr_core::{
    CompositorError, Eye, EyeTexture, PoseSnapshot, RenderTargetSize, TextureBounds,
    TextureHandle, TrackingError,
};
use kvr_runtime::{Tracking, VrRuntime};
use kvr_sync::Compositor;

/// One compositor call as seen by a double
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubmitRecord {
    pub eye: Eye,
    pub handle: TextureHandle,
    pub bounds: TextureBounds,
    pub accepted: bool,
}

/// Fails a seeded random fraction of calls, or follows a failure script
#[derive(Debug)]
pub struct FlakyCompositor {
    failure_rate: f64,
    error: CompositorError,
    rng: Mutex<StdRng>,
    /// Scripted results per eye, consumed before the random draw
    script: Mutex<[VecDeque<bool>; 2]>,
    records: Mutex<Vec<SubmitRecord>>,
}

impl FlakyCompositor {
    pub fn new(failure_rate: f64, seed: u64) -> Self {
        FlakyCompositor {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            error: CompositorError::RequestFailed,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            script: Mutex::new([VecDeque::new(), VecDeque::new()]),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Never fails unless scripted
    pub fn reliable() -> Self {
        Self::new(0.0, 0)
    }

    pub fn with_error(mut self, error: CompositorError) -> Self {
        self.error = error;
        self
    }

    /// Queue explicit results (`true` = accept) for `eye`
    pub fn script(&self, eye: Eye, results: impl IntoIterator<Item = bool>) {
        self.script.lock()[eye.index()].extend(results);
    }

    pub fn records(&self) -> Vec<SubmitRecord> {
        self.records.lock().clone()
    }

    pub fn failures(&self) -> usize {
        self.records.lock().iter().filter(|r| !r.accepted).count()
    }
}

impl Compositor for FlakyCompositor {
    fn submit(
        &self,
        eye: Eye,
        texture: &EyeTexture,
        bounds: &TextureBounds,
    ) -> Result<(), CompositorError> {
        let scripted = self.script.lock()[eye.index()].pop_front();
        let accepted = match scripted {
            Some(accepted) => accepted,
            None => self.rng.lock().gen::<f64>() >= self.failure_rate,
        };

        self.records.lock().push(SubmitRecord {
            eye,
            handle: texture.handle,
            bounds: *bounds,
            accepted,
        });

        if accepted {
            Ok(())
        } else {
            Err(self.error)
        }
    }
}

/// Tracking double: replays queued results, then produces identity poses
#[derive(Debug, Default)]
pub struct ScriptedTracking {
    queued: VecDeque<Result<PoseSnapshot, TrackingError>>,
    frame: u64,
    pub seated_resets: u32,
}

impl ScriptedTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&mut self, count: usize, error: TrackingError) {
        for _ in 0..count {
            self.queued.push_back(Err(error.clone()));
        }
    }
}

impl Tracking for ScriptedTracking {
    fn wait_get_poses(&mut self) -> Result<PoseSnapshot, TrackingError> {
        self.frame += 1;
        match self.queued.pop_front() {
            Some(result) => result,
            None => Ok(PoseSnapshot::identity(self.frame)),
        }
    }

    fn reset_seated_zero_pose(&mut self) {
        self.seated_resets += 1;
    }
}

/// Runtime double with a connected, installed HMD
#[derive(Debug)]
pub struct HeadlessRuntime {
    pub hmd_present: bool,
    pub runtime_installed: bool,
    pub init_error: Option<String>,
    pub render_target: RenderTargetSize,
    shutdowns: AtomicU32,
}

impl HeadlessRuntime {
    /// Times the session released the runtime
    pub fn shutdown_calls(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessRuntime {
    fn default() -> Self {
        HeadlessRuntime {
            hmd_present: true,
            runtime_installed: true,
            init_error: None,
            render_target: RenderTargetSize::new(1656, 1840),
            shutdowns: AtomicU32::new(0),
        }
    }
}

impl VrRuntime for HeadlessRuntime {
    fn is_hmd_present(&self) -> bool {
        self.hmd_present
    }

    fn is_runtime_installed(&self) -> bool {
        self.runtime_installed
    }

    fn init(&self) -> Result<(), String> {
        match &self.init_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn recommended_render_target_size(&self) -> RenderTargetSize {
        self.render_target
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
