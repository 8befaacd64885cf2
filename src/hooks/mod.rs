//! Lifecycle hooks composed from three priority tiers.
//!
//! Hooks belong to one of three chains:
//!
//! - **pre**: before a model invocation (framework → project → agent)
//! - **tool**: around each tool call (same order as `pre`)
//! - **post**: after a model invocation (agent → project → framework)
//!
//! [`HooksRegistry`] holds the registrations, [`HookChainComposer`] turns them
//! into an ordered chain and [`ChainExecutor`] runs it. Each hook can pass the
//! artifact on (possibly modified), ask for a retry or stop the run.

pub mod bundled;
pub mod chain;
pub mod composer;
pub mod hook;
pub mod overlay;
pub mod registry;

pub use bundled::{
    BuiltinFlags, ContentCheck, GuardrailSet, PiiRedactor, QualityScorer, ResolvedBuiltins,
};
pub use chain::{ChainDecision, ChainExecutor, ChainResult, HookDiagnostic};
pub use composer::HookChainComposer;
pub use hook::{
    FailurePolicy, FnHook, Hook, HookContext, HookDescriptor, HookError, HookEvent, HookOutcome,
    HookType, TokenUsage,
};
pub use overlay::{HookOverride, HookOverrideMode, InheritedHook, WrappedHook};
pub use registry::{HookInfo, HooksRegistry};
