//! Model-invocation guard.

use crate::config::LlmInvocationGuardConfig;
use crate::guards::Guard;
use crate::guards::decision::{GuardKind, GuardVerdict, render_message};
use crate::guards::session::{GuardCounters, InvocationCounters};
use crate::hooks::{HookEvent, HookType};

/// Bounds completed model invocations per session. Runs in the `post` chain.
#[derive(Debug, Clone)]
pub struct LlmInvocationGuard {
    config: LlmInvocationGuardConfig,
}

impl LlmInvocationGuard {
    pub fn new(config: LlmInvocationGuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LlmInvocationGuardConfig {
        &self.config
    }
}

impl Guard for LlmInvocationGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::LlmInvocation
    }

    fn hook_type(&self) -> HookType {
        HookType::Post
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn watches(&self, event: &HookEvent) -> bool {
        matches!(event, HookEvent::ModelInvocation { .. })
    }

    fn observe(&self, event: &HookEvent, counters: &mut GuardCounters) -> Option<GuardVerdict> {
        match event {
            HookEvent::ModelInvocation { .. } => {
                Some(evaluate(&self.config, &mut counters.invocations))
            }
            _ => None,
        }
    }
}

/// Evaluate one completed model invocation.
///
/// Over the limit stops the run. Crossing `warn_threshold` for the first time
/// continues with a one-time advisory.
pub fn evaluate(
    config: &LlmInvocationGuardConfig,
    counters: &mut InvocationCounters,
) -> GuardVerdict {
    counters.invocations = counters.invocations.saturating_add(1);
    let count = counters.invocations;
    let max = config.max_invocations;

    if count > max {
        return GuardVerdict::stop(match &config.stop_message_template {
            Some(template) => render_message(
                template,
                &[("count", count.to_string()), ("limit", max.to_string())],
            ),
            None => format!("model invocations ({count}) exceeded the limit of {max}"),
        });
    }

    let ratio = f64::from(count) / f64::from(max);
    if ratio >= config.warn_threshold && !counters.warned {
        counters.warned = true;
        tracing::warn!(count, max, "Model invocation warn threshold reached");
        let remaining = max - count;
        return GuardVerdict::warn(format!(
            "{count} of {max} model invocations used, {remaining} remaining; wrap up soon"
        ));
    }

    GuardVerdict::proceed()
}

/// Invocations left before the guard stops the run.
pub fn remaining(config: &LlmInvocationGuardConfig, counters: &InvocationCounters) -> u32 {
    config.max_invocations.saturating_sub(counters.invocations)
}
