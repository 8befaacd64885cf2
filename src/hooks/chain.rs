//! Sequential execution of a composed hook chain.

use std::sync::Arc;

use crate::hooks::hook::{
    FailurePolicy, HookContext, HookDescriptor, HookError, HookEvent, HookOutcome,
};
use crate::observability::{NoopObserver, Observer, ObserverEvent};

/// How a chain run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainDecision {
    /// Every hook ran.
    Continue,
    /// A hook asked to skip the guarded action and advise the model.
    Retry { hook: String, advisory: String },
    /// A hook ended the run.
    Stop { hook: String, reason: String },
}

/// A `warn`-policy failure that was recorded and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDiagnostic {
    pub hook: String,
    pub error: String,
}

/// The outcome of one chain run.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// The artifact as it stood when the chain ended.
    pub event: HookEvent,
    pub decision: ChainDecision,
    /// Advisories in the order they were produced.
    pub advisories: Vec<String>,
    pub diagnostics: Vec<HookDiagnostic>,
}

impl ChainResult {
    /// The run was stopped; `event` is its partial result.
    pub fn is_bounded(&self) -> bool {
        matches!(self.decision, ChainDecision::Stop { .. })
    }

    pub fn should_retry(&self) -> bool {
        matches!(self.decision, ChainDecision::Retry { .. })
    }
}

/// Runs hook chains strictly in order.
pub struct ChainExecutor {
    observer: Arc<dyn Observer>,
}

impl ChainExecutor {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    pub fn with_observer(observer: Arc<dyn Observer>) -> Self {
        Self { observer }
    }

    /// Thread `event` through `chain`.
    ///
    /// - `Continue` passes its (possibly modified) artifact on.
    /// - `Retry` and `Stop` end the run early; the artifact is the one the
    ///   deciding hook received.
    /// - A failure is handled by the hook's policy: `Raise` aborts with
    ///   [`HookError::Aborted`], `Warn` records a diagnostic and `Ignore`
    ///   drops it. Both continue with the artifact from before the hook.
    pub async fn run(
        &self,
        chain: &[HookDescriptor],
        event: HookEvent,
        ctx: &HookContext,
    ) -> Result<ChainResult, HookError> {
        let mut current = event;
        let mut advisories = Vec::new();
        let mut diagnostics = Vec::new();

        for hook in chain {
            let before = current.clone();
            match hook.invoke(current, ctx).await {
                Ok(HookOutcome::Continue { event, advisory }) => {
                    advisories.extend(advisory);
                    current = event;
                }
                Ok(HookOutcome::Retry { advisory }) => {
                    tracing::debug!(hook = hook.name(), "Hook requested retry");
                    advisories.push(advisory.clone());
                    return Ok(ChainResult {
                        event: before,
                        decision: ChainDecision::Retry {
                            hook: hook.name().to_string(),
                            advisory,
                        },
                        advisories,
                        diagnostics,
                    });
                }
                Ok(HookOutcome::Stop { reason }) => {
                    tracing::debug!(hook = hook.name(), "Hook stopped the run: {}", reason);
                    self.observer.record_event(&ObserverEvent::RunBounded {
                        session_id: before.session_id().to_string(),
                        hook: hook.name().to_string(),
                        reason: reason.clone(),
                    });
                    return Ok(ChainResult {
                        event: before,
                        decision: ChainDecision::Stop {
                            hook: hook.name().to_string(),
                            reason,
                        },
                        advisories,
                        diagnostics,
                    });
                }
                Err(err) => {
                    let policy = hook.on_failure();
                    if policy != FailurePolicy::Ignore {
                        self.observer.record_event(&ObserverEvent::HookFailed {
                            hook: hook.name().to_string(),
                            policy: format!("{policy:?}").to_lowercase(),
                            error: err.to_string(),
                        });
                    }

                    match policy {
                        FailurePolicy::Raise => {
                            tracing::warn!(hook = hook.name(), "Hook failed (raise): {}", err);
                            let reason = match err {
                                HookError::ExecutionFailed { reason }
                                | HookError::Aborted { reason, .. } => reason,
                            };
                            return Err(HookError::Aborted {
                                hook: hook.name().to_string(),
                                reason,
                            });
                        }
                        FailurePolicy::Warn => {
                            tracing::warn!(hook = hook.name(), "Hook failed (warn): {}", err);
                            diagnostics.push(HookDiagnostic {
                                hook: hook.name().to_string(),
                                error: err.to_string(),
                            });
                        }
                        FailurePolicy::Ignore => {}
                    }
                    current = before;
                }
            }
        }

        Ok(ChainResult {
            event: current,
            decision: ChainDecision::Continue,
            advisories,
            diagnostics,
        })
    }
}

impl Default for ChainExecutor {
    fn default() -> Self {
        Self::new()
    }
}
