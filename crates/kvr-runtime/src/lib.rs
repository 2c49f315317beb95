//! KVR Runtime - HMD session orchestration
//!
//! This crate drives the stereo submitter from the host's point of view:
//! 1. Probe and initialize the VR runtime
//! 2. Poll tracking once per engine tick and arm the pose clock
//! 3. Forward each eye's rendered buffer to its submitter
//! 4. Apply the session health policy to repeated failures
//! 5. Shut down on scene unload

pub mod config;
pub mod error;
pub mod health;
pub mod runtime;
pub mod session;
pub mod telemetry;

pub use config::*;
pub use error::*;
pub use health::*;
pub use runtime::*;
pub use session::*;
pub use telemetry::init_logging;
