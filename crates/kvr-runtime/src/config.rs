//! Session configuration

use serde::Deserialize;

use kvr_core::{ColorSpace, KvrError, KvrResult, RenderTargetSize, TextureType};

/// Host graphics device type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum GraphicsApi {
    OpenGlCore,
    OpenGlEs2,
    OpenGlEs3,
    Direct3D9,
    Direct3D11,
    Direct3D12,
    Vulkan,
}

impl GraphicsApi {
    /// Compositor texture type for this device, `None` if the
    /// compositor cannot take its textures.
    pub fn texture_type(self) -> Option<TextureType> {
        match self {
            GraphicsApi::OpenGlCore | GraphicsApi::OpenGlEs2 | GraphicsApi::OpenGlEs3 => {
                Some(TextureType::OpenGl)
            }
            GraphicsApi::Direct3D11 | GraphicsApi::Direct3D12 => Some(TextureType::DirectX),
            GraphicsApi::Vulkan => Some(TextureType::Vulkan),
            GraphicsApi::Direct3D9 => None,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// HMD session configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Submit as soon as the session is initialized
    pub start_enabled: bool,
    /// Consecutive compositor failures on one eye before the session degrades
    pub max_consecutive_failures: u32,
    /// Consecutive tracking failures before output is disabled
    pub max_tracking_failures: u32,
    /// Host graphics device
    pub graphics_api: GraphicsApi,
    /// Color space hint for submitted textures
    pub color_space: ColorSpace,
    /// Fixed eye render target size instead of the runtime's recommendation
    pub render_target_override: Option<RenderTargetSize>,
    pub logging: LoggingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            start_enabled: false,
            // About one second of frames at 90 Hz
            max_consecutive_failures: 90,
            max_tracking_failures: 1,
            graphics_api: GraphicsApi::Direct3D11,
            color_space: ColorSpace::Auto,
            render_target_override: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Give up on the first failure of any kind
    pub fn strict() -> Self {
        SessionConfig {
            max_consecutive_failures: 1,
            max_tracking_failures: 1,
            ..Self::default()
        }
    }

    /// Ride out long runs of failures (debugging, flaky runtimes)
    pub fn tolerant() -> Self {
        SessionConfig {
            max_consecutive_failures: 900,
            max_tracking_failures: 30,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> KvrResult<Self> {
        let config: SessionConfig =
            serde_json::from_str(json).map_err(|e| KvrError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KvrResult<()> {
        if self.max_consecutive_failures == 0 {
            return Err(KvrError::InvalidConfig(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if self.max_tracking_failures == 0 {
            return Err(KvrError::InvalidConfig(
                "max_tracking_failures must be at least 1".to_string(),
            ));
        }
        if let Some(size) = self.render_target_override {
            if size.is_empty() {
                return Err(KvrError::InvalidConfig(format!(
                    "render target override {} has a zero dimension",
                    size
                )));
            }
        }
        Ok(())
    }
}
