//! Configuration for tierguard.

mod guards;
pub(crate) mod helpers;

pub use self::guards::{
    GuardPreset, GuardsConfig, LlmInvocationGuardConfig, TokenBudgetGuardConfig,
    ToolCallGuardConfig,
};

use crate::error::ConfigError;
use crate::observability::ObservabilityConfig;

/// Process-level configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub guards: GuardsConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            guards: GuardsConfig::from_env()?,
            observability: ObservabilityConfig::resolve()?,
        })
    }
}
