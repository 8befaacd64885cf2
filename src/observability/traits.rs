//! Core observer trait and event/metric types.

/// Sink for resolution and guard lifecycle events.
///
/// Implementations can log to tracing or do nothing at all. The registries,
/// the chain executor and the guard engine record events at key points and
/// the observer decides what to do with them.
///
/// Thread-safe and cheaply cloneable behind `Arc<dyn Observer>`.
pub trait Observer: Send + Sync {
    /// Record a discrete lifecycle event.
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric sample.
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data. No-op by default.
    fn flush(&self) {}

    /// Human-readable backend name (e.g. "noop", "log").
    fn name(&self) -> &str;
}

/// Discrete lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// A registration was rejected because the name exists at that tier slot.
    RegistryConflict { name: String, tier: String },

    /// A hook chain was composed.
    ChainResolved {
        hook_type: String,
        project_id: Option<String>,
        hooks: usize,
        /// Served from the resolution cache.
        cached: bool,
    },

    /// A hook failed under a non-ignore failure policy.
    HookFailed {
        hook: String,
        policy: String,
        error: String,
    },

    /// A guard produced a Retry or Stop decision.
    GuardDecision {
        guard: String,
        session_id: String,
        decision: String,
        advisory: Option<String>,
    },

    /// A session's guard state was created.
    SessionStarted { session_id: String },

    /// A session's guard state was discarded.
    SessionClosed {
        session_id: String,
        /// "closed" or "pruned".
        reason: String,
    },

    /// A chain ended in Stop; the run keeps its partial result.
    RunBounded {
        session_id: String,
        hook: String,
        reason: String,
    },
}

/// Numeric metric samples.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverMetric {
    /// Cumulative tokens consumed by a session.
    TokensUsed(u64),
    /// Current number of live guard sessions (gauge).
    ActiveSessions(u64),
}

#[cfg(test)]
mod tests {
    use crate::observability::traits::*;

    #[test]
    fn event_variants_are_constructible() {
        let _ = ObserverEvent::RegistryConflict {
            name: "audit".into(),
            tier: "framework".into(),
        };
        let _ = ObserverEvent::ChainResolved {
            hook_type: "pre".into(),
            project_id: Some("shop".into()),
            hooks: 3,
            cached: false,
        };
        let _ = ObserverEvent::HookFailed {
            hook: "audit".into(),
            policy: "warn".into(),
            error: "boom".into(),
        };
        let _ = ObserverEvent::GuardDecision {
            guard: "tool_call".into(),
            session_id: "s-1".into(),
            decision: "retry".into(),
            advisory: Some("try something else".into()),
        };
        let _ = ObserverEvent::SessionStarted {
            session_id: "s-1".into(),
        };
        let _ = ObserverEvent::SessionClosed {
            session_id: "s-1".into(),
            reason: "pruned".into(),
        };
        let _ = ObserverEvent::RunBounded {
            session_id: "s-1".into(),
            hook: "builtin:token_budget_guard".into(),
            reason: "budget exhausted".into(),
        };
    }

    #[test]
    fn metric_variants_are_constructible() {
        let _ = ObserverMetric::TokensUsed(500);
        let _ = ObserverMetric::ActiveSessions(3);
    }
}
