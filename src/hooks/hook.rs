//! Core hook types and traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::guards::SessionId;
use crate::registry::TierLevel;

/// Which chain a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    /// Runs before model input is processed.
    Pre,
    /// Runs after a model invocation completes.
    Post,
    /// Runs around each tool invocation.
    Tool,
}

impl HookType {
    /// Tier order of this chain.
    ///
    /// Pre and tool hooks run outer-in, from framework defaults toward agent
    /// specialization. Post hooks run inner-out, from the agent back to the
    /// framework-level final checks.
    pub fn tier_order(&self) -> [TierLevel; 3] {
        match self {
            HookType::Pre | HookType::Tool => TierLevel::ASCENDING,
            HookType::Post => TierLevel::DESCENDING,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::Pre => "pre",
            HookType::Post => "post",
            HookType::Tool => "tool",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the chain does when a hook fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the chain; the failure becomes the run's terminal error.
    #[default]
    Raise,
    /// Record a diagnostic and continue with the artifact from before the hook.
    Warn,
    /// Discard the failure and continue.
    Ignore,
}

/// Token usage reported by a completed model invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// The artifact threaded through a hook chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HookEvent {
    /// Input about to be handed to the model.
    Input {
        session_id: SessionId,
        content: String,
    },
    /// A tool call about to be executed.
    ToolCall {
        session_id: SessionId,
        tool_name: String,
        parameters: serde_json::Value,
    },
    /// A tool call finished.
    ToolResult {
        session_id: SessionId,
        tool_name: String,
        result: String,
        success: bool,
    },
    /// A model invocation completed.
    ModelInvocation {
        session_id: SessionId,
        output: String,
        usage: Option<TokenUsage>,
    },
}

impl HookEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            HookEvent::Input { session_id, .. }
            | HookEvent::ToolCall { session_id, .. }
            | HookEvent::ToolResult { session_id, .. }
            | HookEvent::ModelInvocation { session_id, .. } => session_id,
        }
    }

    /// The primary text content, if the event carries any.
    pub fn content(&self) -> Option<&str> {
        match self {
            HookEvent::Input { content, .. } => Some(content),
            HookEvent::ToolResult { result, .. } => Some(result),
            HookEvent::ModelInvocation { output, .. } => Some(output),
            HookEvent::ToolCall { .. } => None,
        }
    }

    /// Return a copy with the primary text content replaced.
    ///
    /// Events without text content are returned unchanged.
    pub fn with_content(mut self, modified: impl Into<String>) -> Self {
        match &mut self {
            HookEvent::Input { content, .. } => *content = modified.into(),
            HookEvent::ToolResult { result, .. } => *result = modified.into(),
            HookEvent::ModelInvocation { output, .. } => *output = modified.into(),
            HookEvent::ToolCall { .. } => {
                // Tool calls carry JSON parameters, not text
            }
        }
        self
    }
}

/// The result of invoking a hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Continue with the (possibly modified) artifact.
    Continue {
        event: HookEvent,
        /// Advisory text to feed back into the model context.
        advisory: Option<String>,
    },
    /// Skip the guarded action and feed the advisory back to the model.
    Retry { advisory: String },
    /// End the run. Not an error: the run keeps its partial result.
    Stop { reason: String },
}

impl HookOutcome {
    /// Continue with `event` unchanged and no advisory.
    pub fn pass(event: HookEvent) -> Self {
        HookOutcome::Continue {
            event,
            advisory: None,
        }
    }

    /// Continue with `event` and attach an advisory.
    pub fn advise(event: HookEvent, advisory: impl Into<String>) -> Self {
        HookOutcome::Continue {
            event,
            advisory: Some(advisory.into()),
        }
    }

    pub fn retry(advisory: impl Into<String>) -> Self {
        HookOutcome::Retry {
            advisory: advisory.into(),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        HookOutcome::Stop {
            reason: reason.into(),
        }
    }
}

/// Hook execution errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("Hook execution failed: {reason}")]
    ExecutionFailed { reason: String },

    /// A `Raise`-policy hook failed and aborted its chain.
    #[error("Hook '{hook}' failed: {reason}")]
    Aborted { hook: String, reason: String },
}

impl HookError {
    pub fn failed(reason: impl Into<String>) -> Self {
        HookError::ExecutionFailed {
            reason: reason.into(),
        }
    }
}

/// Context passed to hooks alongside the event.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Project the chain was resolved for.
    pub project_id: Option<String>,
    /// Arbitrary metadata hooks can use.
    pub metadata: serde_json::Value,
}

impl HookContext {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }
}

impl Default for HookContext {
    fn default() -> Self {
        Self {
            project_id: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Capability interface for lifecycle hooks.
///
/// Resolution only ever talks to this trait; a hook is identified by its
/// name and routed to a chain by its [`HookType`].
#[async_trait]
pub trait Hook: Send + Sync {
    /// Registry key for this hook.
    fn name(&self) -> &str;

    /// The chain this hook runs in.
    fn hook_type(&self) -> HookType;

    /// How the chain treats a failure of this hook.
    ///
    /// Default: `Raise`.
    fn on_failure(&self) -> FailurePolicy {
        FailurePolicy::Raise
    }

    /// A disabled hook stays registered but is left out of composed chains.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Transform the artifact or decide that the run must not proceed.
    async fn invoke(&self, event: HookEvent, ctx: &HookContext)
    -> Result<HookOutcome, HookError>;
}

/// A shareable hook handle, as stored in registries and chains.
pub type HookDescriptor = Arc<dyn Hook>;

type HookFn = dyn Fn(HookEvent) -> Result<HookOutcome, HookError> + Send + Sync;

/// A hook backed by a plain closure.
///
/// Useful for project- and agent-level hooks that don't need their own type.
pub struct FnHook {
    name: String,
    hook_type: HookType,
    on_failure: FailurePolicy,
    enabled: bool,
    f: Arc<HookFn>,
}

impl FnHook {
    pub fn new<F>(name: impl Into<String>, hook_type: HookType, f: F) -> Self
    where
        F: Fn(HookEvent) -> Result<HookOutcome, HookError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            hook_type,
            on_failure: FailurePolicy::default(),
            enabled: true,
            f: Arc::new(f),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Wrap into a [`HookDescriptor`].
    pub fn into_descriptor(self) -> HookDescriptor {
        Arc::new(self)
    }
}

#[async_trait]
impl Hook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn hook_type(&self) -> HookType {
        self.hook_type
    }

    fn on_failure(&self) -> FailurePolicy {
        self.on_failure
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn invoke(
        &self,
        event: HookEvent,
        _ctx: &HookContext,
    ) -> Result<HookOutcome, HookError> {
        (self.f)(event)
    }
}
