//! Tracing-based observer that emits structured log events.
//!
//! Events appear alongside normal application logs. Good for local
//! development and debugging.

use crate::observability::traits::{Observer, ObserverEvent, ObserverMetric};

/// Observer that logs events and metrics via `tracing`.
pub struct LogObserver;

impl Observer for LogObserver {
    #[allow(clippy::cognitive_complexity)] // Exhaustive match over every event variant
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::RegistryConflict { name, tier } => {
                tracing::warn!(name, tier, "observer: registry.conflict");
            }
            ObserverEvent::ChainResolved {
                hook_type,
                project_id,
                hooks,
                cached,
            } => {
                tracing::debug!(
                    hook_type,
                    project_id = project_id.as_deref().unwrap_or(""),
                    hooks,
                    cached,
                    "observer: chain.resolved"
                );
            }
            ObserverEvent::HookFailed {
                hook,
                policy,
                error,
            } => {
                tracing::warn!(hook, policy, error = error.as_str(), "observer: hook.failed");
            }
            ObserverEvent::GuardDecision {
                guard,
                session_id,
                decision,
                advisory,
            } => {
                tracing::info!(
                    guard,
                    session_id,
                    decision,
                    advisory = advisory.as_deref().unwrap_or(""),
                    "observer: guard.decision"
                );
            }
            ObserverEvent::SessionStarted { session_id } => {
                tracing::info!(session_id, "observer: session.start");
            }
            ObserverEvent::SessionClosed { session_id, reason } => {
                tracing::info!(session_id, reason, "observer: session.close");
            }
            ObserverEvent::RunBounded {
                session_id,
                hook,
                reason,
            } => {
                tracing::warn!(session_id, hook, reason, "observer: run.bounded");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::TokensUsed(n) => {
                tracing::debug!(tokens = n, "observer: metric.tokens_used");
            }
            ObserverMetric::ActiveSessions(n) => {
                tracing::debug!(active_sessions = n, "observer: metric.active_sessions");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
