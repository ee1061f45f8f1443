//! Tracing Setup
//!
//! Console logging for binaries embedding the registry:
//! - `RUST_LOG` - filter directives (default: `info`)
//! - `LOG_FORMAT` - `json` for one JSON object per line, anything else for text

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: LogFormat,
    /// Level applied when `RUST_LOG` is unset
    pub default_level: LevelFilter,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            default_level: LevelFilter::INFO,
        }
    }
}

impl TracingConfig {
    /// Defaults with `LOG_FORMAT` applied
    pub fn from_env() -> Self {
        let format = std::env::var("LOG_FORMAT")
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();
        Self {
            format,
            ..Self::default()
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.default_level.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Text => registry.with(fmt::layer()).try_init()?,
    }

    tracing::debug!(format = ?config.format, "Tracing initialized");
    Ok(())
}
