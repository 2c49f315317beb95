//! KVR Core - Fundamental types for stereo frame submission
//!
//! This crate defines the types shared by every KVR layer:
//! - Eyes (Left, Right) and per-eye indexing
//! - Pose sequence numbers and opaque pose snapshots
//! - Eye texture descriptors and compositor texture bounds
//! - Error taxonomy

pub mod eye;
pub mod pose;
pub mod texture;
pub mod error;

pub use eye::*;
pub use pose::*;
pub use texture::*;
pub use error::*;
