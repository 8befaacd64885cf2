//! Composite hooks built by wrap and inherit overrides.

use std::sync::Arc;

use async_trait::async_trait;

use crate::hooks::hook::{
    FailurePolicy, Hook, HookContext, HookDescriptor, HookError, HookEvent, HookOutcome, HookType,
};
use crate::registry::{Directive, OverrideMode, Overlay};

/// Runs `wrapper`, then `inner` on the wrapper's output.
///
/// A Retry or Stop from the wrapper skips the inner hook. Advisories from
/// both are kept.
pub struct WrappedHook {
    wrapper: HookDescriptor,
    inner: HookDescriptor,
    hook_type: HookType,
    on_failure: FailurePolicy,
    enabled: bool,
}

impl WrappedHook {
    /// Wrap `inner`, keeping its chain, failure policy and enabled flag.
    pub fn new(wrapper: HookDescriptor, inner: HookDescriptor) -> Self {
        let hook_type = inner.hook_type();
        let on_failure = inner.on_failure();
        let enabled = inner.is_enabled();
        Self {
            wrapper,
            inner,
            hook_type,
            on_failure,
            enabled,
        }
    }
}

#[async_trait]
impl Hook for WrappedHook {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn hook_type(&self) -> HookType {
        self.hook_type
    }

    fn on_failure(&self) -> FailurePolicy {
        self.on_failure
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn invoke(&self, event: HookEvent, ctx: &HookContext) -> Result<HookOutcome, HookError> {
        let (event, outer) = match self.wrapper.invoke(event, ctx).await? {
            HookOutcome::Continue { event, advisory } => (event, advisory),
            other => return Ok(other),
        };

        match self.inner.invoke(event, ctx).await? {
            HookOutcome::Continue { event, advisory } => Ok(HookOutcome::Continue {
                event,
                advisory: join_advisories(outer, advisory),
            }),
            other => Ok(other),
        }
    }
}

fn join_advisories(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
        (a, b) => a.or(b),
    }
}

/// Keeps `base`'s behavior under a higher tier's chain and failure policy.
pub struct InheritedHook {
    base: HookDescriptor,
    hook_type: HookType,
    on_failure: FailurePolicy,
    enabled: bool,
}

impl InheritedHook {
    pub fn new(base: HookDescriptor, metadata: &dyn Hook) -> Self {
        Self {
            base,
            hook_type: metadata.hook_type(),
            on_failure: metadata.on_failure(),
            enabled: metadata.is_enabled(),
        }
    }
}

#[async_trait]
impl Hook for InheritedHook {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn hook_type(&self) -> HookType {
        self.hook_type
    }

    fn on_failure(&self) -> FailurePolicy {
        self.on_failure
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn invoke(&self, event: HookEvent, ctx: &HookContext) -> Result<HookOutcome, HookError> {
        self.base.invoke(event, ctx).await
    }
}

impl Overlay for HookDescriptor {
    fn overlay(upper: &Self, lower: &Self, mode: OverrideMode) -> Self {
        match mode {
            OverrideMode::Replace => Arc::clone(upper),
            OverrideMode::Wrap => Arc::new(WrappedHook {
                wrapper: Arc::clone(upper),
                inner: Arc::clone(lower),
                hook_type: upper.hook_type(),
                on_failure: upper.on_failure(),
                enabled: upper.is_enabled(),
            }),
            OverrideMode::Inherit => Arc::new(InheritedHook::new(Arc::clone(lower), upper.as_ref())),
        }
    }
}

/// What a [`HookOverride`] does to its target.
#[derive(Clone)]
pub enum HookOverrideMode {
    /// Remove the hook from the chain.
    Disable,
    /// Substitute the hook in place.
    Replace(HookDescriptor),
    /// Run the given hook first, then the original.
    Wrap(HookDescriptor),
}

/// Explicit directive applied to a named hook at composition time.
#[derive(Clone)]
pub struct HookOverride {
    pub target: String,
    pub mode: HookOverrideMode,
}

impl HookOverride {
    pub fn disable(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mode: HookOverrideMode::Disable,
        }
    }

    pub fn replace(target: impl Into<String>, hook: HookDescriptor) -> Self {
        Self {
            target: target.into(),
            mode: HookOverrideMode::Replace(hook),
        }
    }

    pub fn wrap(target: impl Into<String>, wrapper: HookDescriptor) -> Self {
        Self {
            target: target.into(),
            mode: HookOverrideMode::Wrap(wrapper),
        }
    }

    /// Apply to `hook`. `None` means the hook is dropped from the chain.
    pub fn apply(&self, hook: HookDescriptor) -> Option<HookDescriptor> {
        match &self.mode {
            HookOverrideMode::Disable => None,
            HookOverrideMode::Replace(replacement) => Some(Arc::clone(replacement)),
            HookOverrideMode::Wrap(wrapper) => {
                Some(Arc::new(WrappedHook::new(Arc::clone(wrapper), hook)))
            }
        }
    }
}

impl std::fmt::Debug for HookOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            HookOverrideMode::Disable => "disable".to_string(),
            HookOverrideMode::Replace(h) => format!("replace({})", h.name()),
            HookOverrideMode::Wrap(h) => format!("wrap({})", h.name()),
        };
        f.debug_struct("HookOverride")
            .field("target", &self.target)
            .field("mode", &mode)
            .finish()
    }
}

impl Directive for HookOverride {
    fn target(&self) -> &str {
        &self.target
    }
}
