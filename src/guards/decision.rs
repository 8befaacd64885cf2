//! Guard decisions and verdicts.

use std::fmt;

use serde::Serialize;

/// What a guard decided for one event.
///
/// Ordered by severity: `Continue < Retry < Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    /// Proceed normally.
    Continue,
    /// Skip the guarded action and feed an advisory back to the model.
    Retry,
    /// End the run; sticky for the rest of the session.
    Stop,
}

impl GuardDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardDecision::Continue => "continue",
            GuardDecision::Retry => "retry",
            GuardDecision::Stop => "stop",
        }
    }
}

impl fmt::Display for GuardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision plus the message to surface with it.
///
/// For `Stop` the advisory carries the stop reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardVerdict {
    pub decision: GuardDecision,
    pub advisory: Option<String>,
}

impl GuardVerdict {
    pub fn proceed() -> Self {
        Self {
            decision: GuardDecision::Continue,
            advisory: None,
        }
    }

    /// Continue, but tell the model something.
    pub fn warn(advisory: impl Into<String>) -> Self {
        Self {
            decision: GuardDecision::Continue,
            advisory: Some(advisory.into()),
        }
    }

    pub fn retry(advisory: impl Into<String>) -> Self {
        Self {
            decision: GuardDecision::Retry,
            advisory: Some(advisory.into()),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            decision: GuardDecision::Stop,
            advisory: Some(reason.into()),
        }
    }

    pub fn is_stop(&self) -> bool {
        self.decision == GuardDecision::Stop
    }

    /// Fold `other` into `self`: the more severe decision wins and the
    /// advisories are concatenated in order.
    pub fn combine(self, other: GuardVerdict) -> GuardVerdict {
        let advisory = match (self.advisory, other.advisory) {
            (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
            (a, b) => a.or(b),
        };
        GuardVerdict {
            decision: self.decision.max(other.decision),
            advisory,
        }
    }
}

impl Default for GuardVerdict {
    fn default() -> Self {
        Self::proceed()
    }
}

/// Fill `{name}` placeholders in a configured message template.
///
/// Placeholders without a value are left as written.
pub(crate) fn render_message(template: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}

/// The built-in guard families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    ToolCall,
    LlmInvocation,
    TokenBudget,
}

impl GuardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardKind::ToolCall => "tool_call",
            GuardKind::LlmInvocation => "llm_invocation",
            GuardKind::TokenBudget => "token_budget",
        }
    }

    /// Registry name of the hook that runs this guard.
    pub fn hook_name(&self) -> &'static str {
        match self {
            GuardKind::ToolCall => "builtin:tool_call_guard",
            GuardKind::LlmInvocation => "builtin:llm_invocation_guard",
            GuardKind::TokenBudget => "builtin:token_budget_guard",
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
