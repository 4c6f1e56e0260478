//! Logging setup for hosts that do not install their own subscriber

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when neither the config nor `RUST_LOG` names one
pub const DEFAULT_FILTER: &str = "repsense=info";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives; falls back to `RUST_LOG`, then `repsense=info`
    pub filter: Option<String>,
    pub format: TelemetryFormat,
}

impl TelemetryConfig {
    pub fn json() -> Self {
        Self {
            format: TelemetryFormat::Json,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match &self.filter {
            Some(directives) => Ok(EnvFilter::try_new(directives)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Install the global `tracing` subscriber
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        TelemetryFormat::Pretty => registry.with(fmt::layer()).try_init()?,
        TelemetryFormat::Json => registry.with(fmt::layer().json()).try_init()?,
    }
    Ok(())
}
