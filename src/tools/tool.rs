//! Tool trait and types.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Definition of a tool's parameters using JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Create a new tool schema with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: empty_parameters(),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

pub(crate) fn empty_parameters() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// A callable tool the agent can use.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// What the tool does, as shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// The schema for model function calling.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Shared handle to a registered tool.
pub type ToolDescriptor = Arc<dyn Tool>;

type ToolFn = dyn Fn(serde_json::Value) -> Result<serde_json::Value, ToolError> + Send + Sync;

/// A tool backed by a closure.
pub struct FnTool {
    schema: ToolSchema,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            schema: ToolSchema::new(name, description),
            func: Box::new(func),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.schema.parameters = parameters;
        self
    }

    pub fn into_descriptor(self) -> ToolDescriptor {
        Arc::new(self)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.schema.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn description(&self) -> &str {
        &self.schema.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.parameters.clone()
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        (self.func)(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple echo tool for testing.
    #[derive(Debug)]
    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input message. Useful for testing."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to echo back"
                    }
                },
                "required": ["message"]
            })
        }

        async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            let message = params
                .get("message")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidParameters("missing 'message'".into()))?;
            Ok(serde_json::json!(message))
        }
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let result = EchoTool
            .execute(serde_json::json!({"message": "hello"}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!("hello"));
    }

    #[test]
    fn test_tool_schema() {
        let schema = EchoTool.schema();
        assert_eq!(schema.name, "echo");
        assert!(!schema.description.is_empty());
        assert_eq!(schema.parameters["required"], serde_json::json!(["message"]));
    }

    #[tokio::test]
    async fn test_fn_tool() {
        let tool = FnTool::new("double", "Doubles n", |params| {
            let n = params["n"]
                .as_i64()
                .ok_or_else(|| ToolError::InvalidParameters("n must be an integer".into()))?;
            Ok(serde_json::json!(n * 2))
        });

        assert_eq!(tool.name(), "double");
        assert_eq!(tool.parameters_schema(), empty_parameters());
        assert_eq!(
            tool.execute(serde_json::json!({"n": 21})).await.unwrap(),
            serde_json::json!(42)
        );
        assert!(matches!(
            tool.execute(serde_json::json!({"n": "x"})).await,
            Err(ToolError::InvalidParameters(_))
        ));
    }

    #[tokio::test]
    async fn test_echo_tool_rejects_missing_message() {
        let err = EchoTool
            .execute(serde_json::json!({"message": 42}))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::InvalidParameters("missing 'message'".into()));
    }
}
