//! Execution guard configuration and presets.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::helpers::{parse_bool_env, parse_optional_env};
use crate::error::ConfigError;

/// Named base values for every guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPreset {
    #[default]
    Default,
    Strict,
    Relaxed,
}

impl FromStr for GuardPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(GuardPreset::Default),
            "strict" => Ok(GuardPreset::Strict),
            "relaxed" => Ok(GuardPreset::Relaxed),
            _ => Err(format!(
                "unknown preset '{s}', expected default, strict or relaxed"
            )),
        }
    }
}

/// Limits for repeated tool calls within one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ToolCallGuardConfig {
    pub enabled: bool,
    /// Calls to a single tool before it is skipped with a Retry.
    pub max_calls_per_tool: u32,
    /// Retries issued for a single tool before escalating to Stop.
    pub max_retries_per_tool: u32,
    /// Calls across all tools before the run is stopped.
    pub max_total_calls: u32,
    /// Replaces the Retry advisory. Placeholders: `{tool_name}`,
    /// `{call_count}`, `{limit}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_message_template: Option<String>,
    /// Wraps the Stop reason. Placeholder: `{reason}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_message_template: Option<String>,
}

impl ToolCallGuardConfig {
    pub fn preset(preset: GuardPreset) -> Self {
        let (max_calls_per_tool, max_retries_per_tool, max_total_calls) = match preset {
            GuardPreset::Default => (5, 3, 30),
            GuardPreset::Strict => (3, 2, 15),
            GuardPreset::Relaxed => (10, 5, 50),
        };
        Self {
            enabled: true,
            max_calls_per_tool,
            max_retries_per_tool,
            max_total_calls,
            retry_message_template: None,
            stop_message_template: None,
        }
    }

    fn from_env(base: Self) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("TOOL_GUARD_ENABLED", base.enabled)?,
            max_calls_per_tool: parse_optional_env(
                "TOOL_GUARD_MAX_CALLS_PER_TOOL",
                base.max_calls_per_tool,
            )?,
            max_retries_per_tool: parse_optional_env(
                "TOOL_GUARD_MAX_RETRIES_PER_TOOL",
                base.max_retries_per_tool,
            )?,
            max_total_calls: parse_optional_env("TOOL_GUARD_MAX_TOTAL_CALLS", base.max_total_calls)?,
            ..base
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("max_calls_per_tool", u64::from(self.max_calls_per_tool))?;
        require_positive("max_total_calls", u64::from(self.max_total_calls))
    }
}

impl Default for ToolCallGuardConfig {
    fn default() -> Self {
        Self::preset(GuardPreset::Default)
    }
}

/// Limits for completed model invocations within one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LlmInvocationGuardConfig {
    pub enabled: bool,
    pub max_invocations: u32,
    /// Fraction of `max_invocations` at which a one-time advisory is issued.
    pub warn_threshold: f64,
    /// Replaces the Stop reason. Placeholders: `{count}`, `{limit}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_message_template: Option<String>,
}

impl LlmInvocationGuardConfig {
    pub fn preset(preset: GuardPreset) -> Self {
        let (max_invocations, warn_threshold) = match preset {
            GuardPreset::Default => (50, 0.8),
            GuardPreset::Strict => (20, 0.7),
            GuardPreset::Relaxed => (100, 0.9),
        };
        Self {
            enabled: true,
            max_invocations,
            warn_threshold,
            stop_message_template: None,
        }
    }

    fn from_env(base: Self) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("LLM_GUARD_ENABLED", base.enabled)?,
            max_invocations: parse_optional_env("LLM_GUARD_MAX_INVOCATIONS", base.max_invocations)?,
            warn_threshold: parse_optional_env("LLM_GUARD_WARN_THRESHOLD", base.warn_threshold)?,
            ..base
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("max_invocations", u64::from(self.max_invocations))?;
        require_fraction("warn_threshold", self.warn_threshold)
    }
}

impl Default for LlmInvocationGuardConfig {
    fn default() -> Self {
        Self::preset(GuardPreset::Default)
    }
}

/// Cumulative token budget within one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TokenBudgetGuardConfig {
    pub enabled: bool,
    pub max_tokens: u64,
    /// Fraction of `max_tokens` at which a one-time advisory is issued.
    pub warn_threshold: f64,
    /// Replaces the Stop reason. Placeholders: `{total}`, `{limit}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_message_template: Option<String>,
}

impl TokenBudgetGuardConfig {
    pub fn preset(preset: GuardPreset) -> Self {
        let (max_tokens, warn_threshold) = match preset {
            GuardPreset::Default => (100_000, 0.8),
            GuardPreset::Strict => (30_000, 0.7),
            GuardPreset::Relaxed => (500_000, 0.9),
        };
        Self {
            enabled: true,
            max_tokens,
            warn_threshold,
            stop_message_template: None,
        }
    }

    fn from_env(base: Self) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse_bool_env("TOKEN_GUARD_ENABLED", base.enabled)?,
            max_tokens: parse_optional_env("TOKEN_GUARD_MAX_TOKENS", base.max_tokens)?,
            warn_threshold: parse_optional_env("TOKEN_GUARD_WARN_THRESHOLD", base.warn_threshold)?,
            ..base
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("max_tokens", self.max_tokens)?;
        require_fraction("warn_threshold", self.warn_threshold)
    }
}

impl Default for TokenBudgetGuardConfig {
    fn default() -> Self {
        Self::preset(GuardPreset::Default)
    }
}

const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;
/// Upper bound for `session_idle_secs`: one year.
pub const MAX_SESSION_IDLE_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration for the whole guard engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GuardsConfig {
    pub tool_call: ToolCallGuardConfig,
    pub llm_invocation: LlmInvocationGuardConfig,
    pub token_budget: TokenBudgetGuardConfig,
    /// Sessions idle for longer than this are pruned. 0 disables pruning.
    pub session_idle_secs: u64,
}

impl GuardsConfig {
    pub fn preset(preset: GuardPreset) -> Self {
        Self {
            tool_call: ToolCallGuardConfig::preset(preset),
            llm_invocation: LlmInvocationGuardConfig::preset(preset),
            token_budget: TokenBudgetGuardConfig::preset(preset),
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }

    /// Resolve from `GUARD_PRESET` plus per-field env overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let preset: GuardPreset = parse_optional_env("GUARD_PRESET", GuardPreset::Default)?;
        let base = Self::preset(preset);

        let config = Self {
            tool_call: ToolCallGuardConfig::from_env(base.tool_call)?,
            llm_invocation: LlmInvocationGuardConfig::from_env(base.llm_invocation)?,
            token_budget: TokenBudgetGuardConfig::from_env(base.token_budget)?,
            session_idle_secs: parse_optional_env("GUARD_SESSION_IDLE_SECS", base.session_idle_secs)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tool_call.validate()?;
        self.llm_invocation.validate()?;
        self.token_budget.validate()?;
        if self.session_idle_secs > MAX_SESSION_IDLE_SECS {
            return Err(ConfigError::InvalidValue {
                key: "session_idle_secs".to_string(),
                message: format!(
                    "must be at most {MAX_SESSION_IDLE_SECS}, got {}",
                    self.session_idle_secs
                ),
            });
        }
        Ok(())
    }

    /// Idle timeout for session pruning, if enabled.
    pub fn session_idle(&self) -> Option<Duration> {
        (self.session_idle_secs > 0).then(|| Duration::from_secs(self.session_idle_secs))
    }
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self::preset(GuardPreset::Default)
    }
}

fn require_positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}

fn require_fraction(key: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be between 0 and 1, got {value}"),
        });
    }
    Ok(())
}
