//! Error types for KVR

use thiserror::Error;

use crate::Eye;

/// Errors reported by the VR compositor on submit or pose wait.
/// Codes follow the compositor runtime's numbering.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorError {
    #[error("Request failed")]
    RequestFailed,

    #[error("Incompatible compositor version")]
    IncompatibleVersion,

    #[error("Application does not have focus")]
    DoNotHaveFocus,

    #[error("Invalid texture")]
    InvalidTexture,

    #[error("Application is not a scene application")]
    IsNotSceneApplication,

    #[error("Texture is on the wrong device")]
    TextureIsOnWrongDevice,

    #[error("Texture uses an unsupported format")]
    TextureUsesUnsupportedFormat,

    #[error("Shared textures not supported")]
    SharedTexturesNotSupported,

    #[error("Index out of range")]
    IndexOutOfRange,

    #[error("Frame already submitted")]
    AlreadySubmitted,

    #[error("Invalid texture bounds")]
    InvalidBounds,

    #[error("Unknown compositor error code {0}")]
    Unknown(i32),
}

impl CompositorError {
    /// Map a raw runtime error code. `0` is success and yields `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        let err = match code {
            0 => return None,
            1 => CompositorError::RequestFailed,
            100 => CompositorError::IncompatibleVersion,
            101 => CompositorError::DoNotHaveFocus,
            102 => CompositorError::InvalidTexture,
            103 => CompositorError::IsNotSceneApplication,
            104 => CompositorError::TextureIsOnWrongDevice,
            105 => CompositorError::TextureUsesUnsupportedFormat,
            106 => CompositorError::SharedTexturesNotSupported,
            107 => CompositorError::IndexOutOfRange,
            108 => CompositorError::AlreadySubmitted,
            109 => CompositorError::InvalidBounds,
            other => CompositorError::Unknown(other),
        };
        Some(err)
    }

    /// Raw runtime error code
    pub fn code(self) -> i32 {
        match self {
            CompositorError::RequestFailed => 1,
            CompositorError::IncompatibleVersion => 100,
            CompositorError::DoNotHaveFocus => 101,
            CompositorError::InvalidTexture => 102,
            CompositorError::IsNotSceneApplication => 103,
            CompositorError::TextureIsOnWrongDevice => 104,
            CompositorError::TextureUsesUnsupportedFormat => 105,
            CompositorError::SharedTexturesNotSupported => 106,
            CompositorError::IndexOutOfRange => 107,
            CompositorError::AlreadySubmitted => 108,
            CompositorError::InvalidBounds => 109,
            CompositorError::Unknown(code) => code,
        }
    }
}

/// Errors reported by the tracking poll
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    #[error("Pose wait failed: {0}")]
    WaitGetPoses(CompositorError),

    #[error("HMD pose not valid")]
    InvalidPose,

    #[error("Tracking runtime unavailable")]
    Unavailable,
}

/// Core KVR errors
#[derive(Error, Debug)]
pub enum KvrError {
    #[error("Compositor error on {eye} eye: {source}")]
    Compositor {
        eye: Eye,
        #[source]
        source: CompositorError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for KVR operations
pub type KvrResult<T> = Result<T, KvrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compositor_code_roundtrip() {
        for code in [1, 100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 4242] {
            let err = CompositorError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_zero_code_is_success() {
        assert_eq!(CompositorError::from_code(0), None);
    }

    #[test]
    fn test_error_display_names_eye() {
        let err = KvrError::Compositor {
            eye: Eye::Right,
            source: CompositorError::InvalidTexture,
        };
        assert_eq!(err.to_string(), "Compositor error on right eye: Invalid texture");
    }
}
