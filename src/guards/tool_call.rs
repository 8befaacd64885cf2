//! Tool-call guard.
//!
//! Two layers of protection against tool loops:
//!
//! - soft limit: a single tool called too often is skipped with a Retry and
//!   the model is told to try something else;
//! - hard limit: too many retries for one tool, or too many calls overall,
//!   stop the run.

use crate::config::ToolCallGuardConfig;
use crate::guards::Guard;
use crate::guards::decision::{GuardKind, GuardVerdict, render_message};
use crate::guards::session::{GuardCounters, ToolCallCounters};
use crate::hooks::{HookEvent, HookType};

/// Bounds tool calls per session. Runs in the `tool` chain.
#[derive(Debug, Clone)]
pub struct ToolCallGuard {
    config: ToolCallGuardConfig,
}

impl ToolCallGuard {
    pub fn new(config: ToolCallGuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolCallGuardConfig {
        &self.config
    }
}

impl Guard for ToolCallGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::ToolCall
    }

    fn hook_type(&self) -> HookType {
        HookType::Tool
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn watches(&self, event: &HookEvent) -> bool {
        matches!(event, HookEvent::ToolCall { .. })
    }

    fn observe(&self, event: &HookEvent, counters: &mut GuardCounters) -> Option<GuardVerdict> {
        match event {
            HookEvent::ToolCall { tool_name, .. } => Some(evaluate(
                &self.config,
                &mut counters.tool_calls,
                tool_name,
            )),
            _ => None,
        }
    }
}

/// Evaluate one tool call against the session's counters.
///
/// Every call increments the total and the per-tool count before any limit
/// is checked. The total limit is checked first.
pub fn evaluate(
    config: &ToolCallGuardConfig,
    counters: &mut ToolCallCounters,
    tool: &str,
) -> GuardVerdict {
    counters.total_calls = counters.total_calls.saturating_add(1);
    let calls = counters
        .per_tool_calls
        .entry(tool.to_string())
        .or_insert(0);
    *calls = calls.saturating_add(1);
    let calls = *calls;

    if counters.total_calls > config.max_total_calls {
        return stop(
            config,
            format!(
                "total tool calls ({}) exceeded the limit of {}",
                counters.total_calls, config.max_total_calls
            ),
        );
    }

    if calls > config.max_calls_per_tool {
        let retries = counters
            .per_tool_retries
            .entry(tool.to_string())
            .or_insert(0);
        if *retries < config.max_retries_per_tool {
            *retries += 1;
            tracing::debug!(
                tool,
                calls,
                retries = *retries,
                "Tool call limit reached, asking model to retry"
            );
            let advisory = match &config.retry_message_template {
                Some(template) => render_message(
                    template,
                    &[
                        ("tool_name", tool.to_string()),
                        ("call_count", calls.to_string()),
                        ("limit", config.max_calls_per_tool.to_string()),
                    ],
                ),
                None => format!("tool {tool} called too often, consider a different approach"),
            };
            return GuardVerdict::retry(advisory);
        }
        return stop(
            config,
            format!(
                "tool {tool} kept being called after {} retries",
                config.max_retries_per_tool
            ),
        );
    }

    GuardVerdict::proceed()
}

fn stop(config: &ToolCallGuardConfig, reason: String) -> GuardVerdict {
    match &config.stop_message_template {
        Some(template) => GuardVerdict::stop(render_message(template, &[("reason", reason)])),
        None => GuardVerdict::stop(reason),
    }
}
