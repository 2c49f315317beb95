//! External VR runtime seams
//!
//! The VR runtime (probe, init, pose wait) lives outside this workspace.
//! These traits are the only surface the session needs from it.

use kvr_core::{PoseSnapshot, RenderTargetSize, TrackingError};

/// Runtime probe, initialization and teardown
pub trait VrRuntime: Send + Sync {
    /// An HMD is connected
    fn is_hmd_present(&self) -> bool;

    /// The VR runtime is installed (and, for scene apps, running)
    fn is_runtime_installed(&self) -> bool;

    /// Initialize as a scene application. The error is the runtime's own
    /// description of the init failure.
    fn init(&self) -> Result<(), String>;

    /// Per-eye render target size the runtime recommends
    fn recommended_render_target_size(&self) -> RenderTargetSize;

    /// Release the runtime. Called once, after a successful `init`.
    fn shutdown(&self);
}

/// Tracking poll, called once per engine tick
pub trait Tracking: Send {
    /// Wait for and return the poses for the next frame
    fn wait_get_poses(&mut self) -> Result<PoseSnapshot, TrackingError>;

    /// Make the current HMD position the seated origin
    fn reset_seated_zero_pose(&mut self);
}
