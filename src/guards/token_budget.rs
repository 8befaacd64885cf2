//! Token-budget guard.

use crate::config::TokenBudgetGuardConfig;
use crate::guards::Guard;
use crate::guards::decision::{GuardKind, GuardVerdict, render_message};
use crate::guards::session::{GuardCounters, TokenCounters};
use crate::hooks::{HookEvent, HookType, TokenUsage};

/// Bounds cumulative token usage per session. Runs in the `post` chain.
#[derive(Debug, Clone)]
pub struct TokenBudgetGuard {
    config: TokenBudgetGuardConfig,
}

impl TokenBudgetGuard {
    pub fn new(config: TokenBudgetGuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TokenBudgetGuardConfig {
        &self.config
    }
}

impl Guard for TokenBudgetGuard {
    fn kind(&self) -> GuardKind {
        GuardKind::TokenBudget
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
            HookEvent::ModelInvocation { usage, .. } => {
                Some(evaluate(&self.config, &mut counters.tokens, *usage))
            }
            _ => None,
        }
    }
}

/// Evaluate one model invocation's token usage.
///
/// Invocations that report no usage, or zero tokens, leave the counters
/// untouched and continue.
pub fn evaluate(
    config: &TokenBudgetGuardConfig,
    counters: &mut TokenCounters,
    usage: Option<TokenUsage>,
) -> GuardVerdict {
    let tokens = match usage {
        Some(usage) if usage.total() > 0 => usage.total(),
        _ => return GuardVerdict::proceed(),
    };

    counters.cumulative = counters.cumulative.saturating_add(tokens);
    let used = counters.cumulative;
    let max = config.max_tokens;

    if used > max {
        return GuardVerdict::stop(match &config.stop_message_template {
            Some(template) => render_message(
                template,
                &[("total", used.to_string()), ("limit", max.to_string())],
            ),
            None => format!("token usage ({used}) exceeded the budget of {max}"),
        });
    }

    let ratio = used as f64 / max as f64;
    if ratio >= config.warn_threshold && !counters.warned {
        counters.warned = true;
        tracing::warn!(used, max, "Token budget warn threshold reached");
        return GuardVerdict::warn(format!(
            "{used} of {max} tokens used ({:.0}%), keep the remaining work short",
            ratio * 100.0
        ));
    }

    GuardVerdict::proceed()
}

/// Tokens left before the guard stops the run.
pub fn remaining(config: &TokenBudgetGuardConfig, counters: &TokenCounters) -> u64 {
    config.max_tokens.saturating_sub(counters.cumulative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::decision::GuardDecision;

    fn config(max: u64, warn: f64) -> TokenBudgetGuardConfig {
        TokenBudgetGuardConfig {
            enabled: true,
            max_tokens: max,
            warn_threshold: warn,
            stop_message_template: None,
        }
    }

    #[test]
    fn test_budget_warns_then_stops() {
        let config = config(1000, 0.8);
        let mut counters = TokenCounters::default();

        let first = evaluate(&config, &mut counters, Some(TokenUsage::new(300, 200)));
        assert_eq!(first, GuardVerdict::proceed());

        let second = evaluate(&config, &mut counters, Some(TokenUsage::new(250, 100)));
        assert_eq!(second.decision, GuardDecision::Continue);
        assert!(second.advisory.as_deref().unwrap().contains("850 of 1000"));

        let third = evaluate(&config, &mut counters, Some(TokenUsage::new(100, 0)));
        assert_eq!(third, GuardVerdict::proceed());

        let fourth = evaluate(&config, &mut counters, Some(TokenUsage::new(100, 0)));
        assert!(fourth.is_stop());
        assert_eq!(counters.cumulative(), 1050);
        assert_eq!(remaining(&config, &counters), 0);
    }

    #[test]
    fn test_missing_or_zero_usage_is_ignored() {
        let config = config(10, 0.5);
        let mut counters = TokenCounters::default();

        assert_eq!(evaluate(&config, &mut counters, None), GuardVerdict::proceed());
        assert_eq!(
            evaluate(&config, &mut counters, Some(TokenUsage::default())),
            GuardVerdict::proceed()
        );
        assert_eq!(counters, TokenCounters::default());
    }

    #[test]
    fn test_exact_budget_is_not_exceeded() {
        let config = config(100, 1.0);
        let mut counters = TokenCounters::default();
        let verdict = evaluate(&config, &mut counters, Some(TokenUsage::new(60, 40)));
        assert_eq!(verdict.decision, GuardDecision::Continue);
        assert_eq!(remaining(&config, &counters), 0);
    }

    #[test]
    fn test_stop_message_template() {
        let config = TokenBudgetGuardConfig {
            stop_message_template: Some("spent {total} of {limit} ({unknown})".into()),
            ..config(10, 1.0)
        };
        let mut counters = TokenCounters::default();
        assert_eq!(
            evaluate(&config, &mut counters, Some(TokenUsage::new(8, 8))),
            GuardVerdict::stop("spent 16 of 10 ({unknown})")
        );
    }
}
