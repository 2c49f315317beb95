//! Eye render target descriptors
//!
//! An [`EyeTexture`] names a native color buffer owned by the renderer.
//! The compositor only borrows it for the duration of a submit call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Native texture handle (GL name, D3D resource pointer, Vulkan image)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    pub const NULL: TextureHandle = TextureHandle(0);

    #[inline]
    pub fn new(raw: u64) -> Self {
        TextureHandle(raw)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Texture({:#x})", self.0)
    }
}

/// Graphics API the texture handle belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureType {
    OpenGl,
    DirectX,
    Vulkan,
}

/// Color space hint passed to the compositor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Auto,
    Gamma,
    Linear,
}

/// Render target dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderTargetSize {
    pub width: u32,
    pub height: u32,
}

impl RenderTargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        RenderTargetSize { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for RenderTargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A rendered color buffer for one eye
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EyeTexture {
    pub handle: TextureHandle,
    pub texture_type: TextureType,
    pub color_space: ColorSpace,
}

impl EyeTexture {
    pub fn new(handle: TextureHandle, texture_type: TextureType) -> Self {
        EyeTexture {
            handle,
            texture_type,
            color_space: ColorSpace::Auto,
        }
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }
}

/// UV sub-region of a texture handed to the compositor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureBounds {
    pub u_min: f32,
    pub v_min: f32,
    pub u_max: f32,
    pub v_max: f32,
}

impl TextureBounds {
    /// Full extent, no flip
    pub const FULL: TextureBounds = TextureBounds {
        u_min: 0.0,
        v_min: 0.0,
        u_max: 1.0,
        v_max: 1.0,
    };

    /// Full extent with the vertical axis flipped.
    /// Engine render targets are bottom-up, the compositor samples top-down.
    pub const FULL_FLIPPED: TextureBounds = TextureBounds {
        u_min: 0.0,
        v_min: 1.0,
        u_max: 1.0,
        v_max: 0.0,
    };

    #[inline]
    pub fn is_vertically_flipped(&self) -> bool {
        self.v_min > self.v_max
    }
}
