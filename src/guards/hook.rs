//! Adapter that runs a [`Guard`] as a lifecycle hook.

use std::sync::Arc;

use async_trait::async_trait;

use crate::guards::Guard;
use crate::guards::decision::{GuardDecision, GuardKind, GuardVerdict};
use crate::guards::session::GuardStateStore;
use crate::hooks::{Hook, HookContext, HookError, HookEvent, HookOutcome, HookType};
use crate::observability::{Observer, ObserverEvent, ObserverMetric};

/// A guard bound to a session store, usable as a hook.
///
/// Each invocation locks only the event's own session, so concurrent events
/// of one session serialize while different sessions never contend.
pub struct GuardHook {
    guard: Arc<dyn Guard>,
    store: Arc<GuardStateStore>,
    observer: Arc<dyn Observer>,
}

impl GuardHook {
    pub fn new(
        guard: Arc<dyn Guard>,
        store: Arc<GuardStateStore>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            guard,
            store,
            observer,
        }
    }

    pub fn kind(&self) -> GuardKind {
        self.guard.kind()
    }

    /// Evaluate `event` against its session's counters.
    ///
    /// A stopped session returns Stop again without touching any counter.
    /// Disabled guards continue. Events the guard doesn't watch continue
    /// and never create session state.
    pub async fn evaluate(&self, event: &HookEvent) -> GuardVerdict {
        if !self.guard.is_enabled() {
            return GuardVerdict::proceed();
        }

        let kind = self.guard.kind();
        let session_id = event.session_id();
        let cell = if self.guard.watches(event) {
            self.store.get_or_create(session_id).await
        } else {
            match self.store.get(session_id).await {
                Some(cell) => cell,
                None => return GuardVerdict::proceed(),
            }
        };
        let mut state = cell.lock().await;

        if let Some(stop) = state.stop_record() {
            tracing::debug!(guard = %kind, session_id = %session_id, "Session already stopped");
            return GuardVerdict::stop(stop.reason.clone());
        }

        let Some(verdict) = self.guard.observe(event, state.counters_mut()) else {
            return GuardVerdict::proceed();
        };

        tracing::debug!(
            guard = %kind,
            session_id = %session_id,
            decision = %verdict.decision,
            counters = ?state.counters(),
            "Guard evaluated event"
        );
        if kind == GuardKind::TokenBudget {
            self.observer.record_metric(&ObserverMetric::TokensUsed(
                state.counters().tokens.cumulative(),
            ));
        }

        match verdict.decision {
            GuardDecision::Continue => return verdict,
            GuardDecision::Retry => {
                tracing::info!(
                    guard = %kind,
                    session_id = %session_id,
                    advisory = verdict.advisory.as_deref().unwrap_or(""),
                    "Guard requested retry"
                );
            }
            GuardDecision::Stop => {
                let reason = verdict.advisory.clone().unwrap_or_default();
                tracing::warn!(
                    guard = %kind,
                    session_id = %session_id,
                    reason = reason.as_str(),
                    "Guard stopped session"
                );
                state.record_stop(kind, reason);
            }
        }

        self.observer.record_event(&ObserverEvent::GuardDecision {
            guard: kind.to_string(),
            session_id: session_id.to_string(),
            decision: verdict.decision.to_string(),
            advisory: verdict.advisory.clone(),
        });
        verdict
    }
}

#[async_trait]
impl Hook for GuardHook {
    fn name(&self) -> &str {
        self.guard.kind().hook_name()
    }

    fn hook_type(&self) -> HookType {
        self.guard.hook_type()
    }

    fn is_enabled(&self) -> bool {
        self.guard.is_enabled()
    }

    async fn invoke(
        &self,
        event: HookEvent,
        _ctx: &HookContext,
    ) -> Result<HookOutcome, HookError> {
        let verdict = self.evaluate(&event).await;
        let advisory = verdict.advisory.unwrap_or_default();
        Ok(match verdict.decision {
            GuardDecision::Continue if advisory.is_empty() => HookOutcome::pass(event),
            GuardDecision::Continue => HookOutcome::advise(event, advisory),
            GuardDecision::Retry => HookOutcome::retry(advisory),
            GuardDecision::Stop => HookOutcome::stop(advisory),
        })
    }
}
