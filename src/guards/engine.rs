//! Execution guard engine.

use std::sync::Arc;

use crate::config::GuardsConfig;
use crate::guards::decision::{GuardDecision, GuardVerdict};
use crate::guards::hook::GuardHook;
use crate::guards::session::{GuardCounters, GuardStateStore, SessionId};
use crate::guards::{
    Guard, LlmInvocationGuard, TokenBudgetGuard, ToolCallGuard, llm_invocation, token_budget,
};
use crate::hooks::{HookDescriptor, HookEvent, HooksRegistry, TokenUsage};
use crate::observability::{NoopObserver, Observer};
use crate::registry::ConflictError;

/// Owns the guard instances and the per-session state they share.
///
/// The guard hooks can be registered into a [`HooksRegistry`] so they become
/// part of resolved chains, or driven directly through [`on_tool_call`] and
/// [`on_model_invocation`].
///
/// [`on_tool_call`]: ExecutionGuardEngine::on_tool_call
/// [`on_model_invocation`]: ExecutionGuardEngine::on_model_invocation
pub struct ExecutionGuardEngine {
    config: GuardsConfig,
    store: Arc<GuardStateStore>,
    tool_call: Arc<GuardHook>,
    llm_invocation: Arc<GuardHook>,
    token_budget: Arc<GuardHook>,
}

impl ExecutionGuardEngine {
    pub fn new(config: GuardsConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    pub fn with_observer(config: GuardsConfig, observer: Arc<dyn Observer>) -> Self {
        let store = Arc::new(GuardStateStore::with_observer(Arc::clone(&observer)));
        let bind = |guard: Arc<dyn Guard>| {
            Arc::new(GuardHook::new(guard, Arc::clone(&store), Arc::clone(&observer)))
        };

        let tool_call =
            bind(Arc::new(ToolCallGuard::new(config.tool_call.clone())) as Arc<dyn Guard>);
        let llm_invocation = bind(
            Arc::new(LlmInvocationGuard::new(config.llm_invocation.clone())) as Arc<dyn Guard>,
        );
        let token_budget =
            bind(Arc::new(TokenBudgetGuard::new(config.token_budget.clone())) as Arc<dyn Guard>);

        Self {
            config,
            store,
            tool_call,
            llm_invocation,
            token_budget,
        }
    }

    pub fn config(&self) -> &GuardsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<GuardStateStore> {
        &self.store
    }

    /// The guard hooks in chain order: tool-call, model-invocation, token-budget.
    pub fn hooks(&self) -> Vec<HookDescriptor> {
        vec![
            Arc::clone(&self.tool_call) as HookDescriptor,
            Arc::clone(&self.llm_invocation) as HookDescriptor,
            Arc::clone(&self.token_budget) as HookDescriptor,
        ]
    }

    /// Register every guard hook at the framework tier.
    pub fn register_into(&self, registry: &HooksRegistry) -> Result<(), ConflictError> {
        registry.register_framework_hooks(self.hooks())
    }

    /// Evaluate a tool call about to be executed.
    pub async fn on_tool_call(
        &self,
        session_id: &SessionId,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> GuardVerdict {
        self.observe(&HookEvent::ToolCall {
            session_id: session_id.clone(),
            tool_name: tool_name.to_string(),
            parameters,
        })
        .await
    }

    /// Evaluate a completed model invocation.
    pub async fn on_model_invocation(
        &self,
        session_id: &SessionId,
        usage: Option<TokenUsage>,
    ) -> GuardVerdict {
        self.observe(&HookEvent::ModelInvocation {
            session_id: session_id.clone(),
            output: String::new(),
            usage,
        })
        .await
    }

    /// Run every guard over `event`, in chain order.
    ///
    /// Stops at the first Retry or Stop, like a hook chain would. Advisories
    /// from earlier guards are kept.
    pub async fn observe(&self, event: &HookEvent) -> GuardVerdict {
        let mut combined = GuardVerdict::proceed();
        for guard in [&self.tool_call, &self.llm_invocation, &self.token_budget] {
            combined = combined.combine(guard.evaluate(event).await);
            if combined.decision != GuardDecision::Continue {
                break;
            }
        }
        combined
    }

    pub async fn is_stopped(&self, session_id: &SessionId) -> bool {
        self.store
            .snapshot(session_id)
            .await
            .is_some_and(|state| state.is_stopped())
    }

    /// Counters of a live session.
    pub async fn counters(&self, session_id: &SessionId) -> Option<GuardCounters> {
        self.store
            .snapshot(session_id)
            .await
            .map(|state| state.counters().clone())
    }

    /// Model invocations left for a session; the full limit if it is unknown.
    pub async fn remaining_invocations(&self, session_id: &SessionId) -> u32 {
        let counters = self.counters(session_id).await.unwrap_or_default();
        llm_invocation::remaining(&self.config.llm_invocation, &counters.invocations)
    }

    /// Tokens left for a session; the full budget if it is unknown.
    pub async fn remaining_tokens(&self, session_id: &SessionId) -> u64 {
        let counters = self.counters(session_id).await.unwrap_or_default();
        token_budget::remaining(&self.config.token_budget, &counters.tokens)
    }

    pub async fn close_session(&self, session_id: &SessionId) -> bool {
        self.store.close(session_id).await
    }

    /// Drop sessions idle past the configured timeout.
    ///
    /// Returns the number pruned; 0 when idle pruning is disabled.
    pub async fn prune_idle(&self) -> usize {
        match self.config.session_idle() {
            Some(max_idle) => self.store.prune_idle(max_idle).await,
            None => 0,
        }
    }
}
