//! Logging setup

use tracing_subscriber::EnvFilter;

use crate::{LoggingConfig, SessionError};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.level`. Fails if the level directive does
/// not parse or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SessionError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| SessionError::Logging(format!("bad level {:?}: {}", config.level, e)))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| SessionError::Logging(e.to_string()))
}
