//! Error types for tierguard.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry conflict: {0}")]
    Registry(#[from] crate::registry::ConflictError),

    #[error("Hook error: {0}")]
    Hook(#[from] crate::hooks::HookError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConflictError, TierLevel};

    #[test]
    fn test_conflict_converts_into_top_level_error() {
        let conflict = ConflictError {
            name: "audit".into(),
            tier: TierLevel::Agent,
            project_id: None,
        };
        let err: Error = conflict.into();
        assert!(matches!(err, Error::Registry(_)));
        assert_eq!(
            err.to_string(),
            "Registry conflict: 'audit' already registered at agent tier"
        );
    }

    #[test]
    fn test_config_error_messages_name_the_key() {
        let err = ConfigError::InvalidValue {
            key: "TOOL_GUARD_MAX_TOTAL_CALLS".into(),
            message: "must be greater than 0".into(),
        };
        assert!(err.to_string().contains("TOOL_GUARD_MAX_TOTAL_CALLS"));
    }
}
