//! Session errors

use thiserror::Error;

use kvr_core::{KvrError, RenderTargetSize, TrackingError};
use kvr_sync::SubmitError;

use crate::GraphicsApi;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("HMD not found on this system")]
    HmdNotFound,

    #[error("VR runtime not installed on this system")]
    RuntimeNotInstalled,

    #[error("Failed to initialize VR runtime: {0}")]
    InitFailed(String),

    #[error("{0:?} is not supported by the compositor")]
    UnsupportedGraphicsApi(GraphicsApi),

    #[error("Invalid render target size {0}")]
    InvalidRenderTarget(RenderTargetSize),

    #[error(transparent)]
    Core(#[from] KvrError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
