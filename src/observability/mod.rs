//! Observability subsystem: trait-based event and metric recording.
//!
//! Provides a pluggable [`Observer`] trait with two backends:
//!
//! | Backend | Description |
//! |---------|-------------|
//! | `noop`  | Zero overhead, discards everything (default) |
//! | `log`   | Emits structured events via `tracing` |
//!
//! The [`create_observer`] factory builds the right backend from
//! [`ObservabilityConfig`]; [`init_tracing`] installs the process-wide
//! `tracing` subscriber.

mod log;
mod noop;
pub mod traits;

#[cfg(test)]
pub mod recording;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

pub use self::log::LogObserver;
pub use self::noop::NoopObserver;
pub use self::traits::{Observer, ObserverEvent, ObserverMetric};

const DEFAULT_LOG_FILTER: &str = "info,tierguard=debug";

/// Configuration for the observability backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// Backend name: "none", "noop" or "log".
    pub backend: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub log_json: bool,
}

impl ObservabilityConfig {
    /// Build from environment variables.
    pub fn resolve() -> Result<Self, ConfigError> {
        use crate::config::helpers::{parse_bool_env, parse_string_env};

        Ok(Self {
            backend: parse_string_env("OBSERVABILITY_BACKEND", "none")?,
            log_filter: parse_string_env("LOG_FILTER", DEFAULT_LOG_FILTER)?,
            log_json: parse_bool_env("LOG_JSON", false)?,
        })
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "none".into(),
            log_filter: DEFAULT_LOG_FILTER.into(),
            log_json: false,
        }
    }
}

/// Create an observer from configuration.
///
/// Returns a [`LogObserver`] for "log" and a [`NoopObserver`] for
/// "none"/"noop" or unknown values.
pub fn create_observer(config: &ObservabilityConfig) -> Arc<dyn Observer> {
    match config.backend.as_str() {
        "log" => Arc::new(LogObserver),
        "none" | "noop" | "" => Arc::new(NoopObserver),
        other => {
            tracing::warn!(backend = other, "Unknown observability backend, using noop");
            Arc::new(NoopObserver)
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured filter. Calling this when a
/// subscriber is already installed is a no-op.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            EnvFilter::try_new(&config.log_filter).map_err(|e| ConfigError::InvalidValue {
                key: "LOG_FILTER".to_string(),
                message: e.to_string(),
            })?
        }
    };

    let installed = if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = installed {
        tracing::debug!("Tracing subscriber already installed: {}", e);
    }
    Ok(())
}
