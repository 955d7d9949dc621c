//! Tracing subscriber setup
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, else the configured level)
//!   └── Fmt Layer (text or JSON)
//! ```

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Logging setup errors
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}'")]
    InvalidFilter(String),

    #[error("Failed to set global subscriber (may already be initialized): {0}")]
    AlreadyInitialized(String),
}

/// Build the filter: RUST_LOG wins, then `level_override`, then the config
pub fn build_filter(config: &LoggingConfig, level_override: Option<&str>) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = level_override.unwrap_or(&config.level);
    EnvFilter::try_new(level).map_err(|_| LoggingError::InvalidFilter(level.to_string()))
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<(), LoggingError> {
    let env_filter = build_filter(config, level_override)?;
    let json = config.json;

    let result = if json {
        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber)
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
