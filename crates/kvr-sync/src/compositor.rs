//! Compositor seam
//!
//! The VR runtime's compositor is external. Submitters only need the
//! per-eye submit call; both eyes may call it concurrently.

use std::sync::Arc;

use kvr_core::{CompositorError, Eye, EyeTexture, TextureBounds};

/// Destination for rendered eye buffers
pub trait Compositor: Send + Sync {
    /// Hand `texture` (region `bounds`) to the compositor for `eye`.
    /// The texture is only borrowed for the duration of the call.
    fn submit(
        &self,
        eye: Eye,
        texture: &EyeTexture,
        bounds: &TextureBounds,
    ) -> Result<(), CompositorError>;
}

impl<C: Compositor + ?Sized> Compositor for Arc<C> {
    fn submit(
        &self,
        eye: Eye,
        texture: &EyeTexture,
        bounds: &TextureBounds,
    ) -> Result<(), CompositorError> {
        (**self).submit(eye, texture, bounds)
    }
}
