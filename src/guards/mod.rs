//! Per-session execution guards.
//!
//! Guards bound an iterative agent loop so it cannot run away:
//!
//! - [`ToolCallGuard`]: too many calls to one tool, or in total
//! - [`LlmInvocationGuard`]: too many model invocations
//! - [`TokenBudgetGuard`]: cumulative token budget
//!
//! Each guard is a pure function of (event, session counters) wrapped in a
//! [`GuardHook`] that owns the session lookup and locking. Decisions are
//! values, never errors: Continue, Retry (skip and advise) or Stop (sticky
//! for the session).

mod decision;
pub mod engine;
mod hook;
pub mod llm_invocation;
pub mod session;
pub mod token_budget;
pub mod tool_call;

pub use decision::{GuardDecision, GuardKind, GuardVerdict};
pub use engine::ExecutionGuardEngine;
pub use hook::GuardHook;
pub use llm_invocation::LlmInvocationGuard;
pub use session::{
    GuardCounters, GuardStateStore, InvocationCounters, SessionCell, SessionId, SessionState,
    StopRecord, TokenCounters, ToolCallCounters,
};
pub use token_budget::TokenBudgetGuard;
pub use tool_call::ToolCallGuard;

use crate::hooks::{HookEvent, HookType};

/// A guard family's evaluation logic.
pub trait Guard: Send + Sync {
    fn kind(&self) -> GuardKind;

    /// The chain this guard is registered into.
    fn hook_type(&self) -> HookType;

    /// A disabled guard always continues and never touches counters.
    fn is_enabled(&self) -> bool;

    /// Whether `event` is one this guard counts.
    fn watches(&self, event: &HookEvent) -> bool;

    /// Update `counters` for `event` and decide.
    ///
    /// Returns `None` for events this guard doesn't watch.
    fn observe(&self, event: &HookEvent, counters: &mut GuardCounters) -> Option<GuardVerdict>;
}
