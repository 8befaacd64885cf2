//! Tiered hook registry and chain resolution entry point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::hooks::bundled::{BuiltinFlags, GuardrailSet};
use crate::hooks::composer::HookChainComposer;
use crate::hooks::hook::{FailurePolicy, HookDescriptor, HookType};
use crate::hooks::overlay::HookOverride;
use crate::observability::{NoopObserver, Observer, ObserverEvent};
use crate::registry::{ConflictError, OverrideMode, SharedRegistry, Tier, TierLevel, TierOverrides};

/// Introspection record for one registered hook.
#[derive(Debug, Clone, PartialEq)]
pub struct HookInfo {
    pub name: String,
    pub hook_type: HookType,
    pub on_failure: FailurePolicy,
    pub enabled: bool,
    /// Tier of the winning registration.
    pub tier: TierLevel,
    pub project_id: Option<String>,
    pub override_mode: OverrideMode,
    /// Tiers the name is registered at, lowest first.
    pub registered_at: Vec<TierLevel>,
}

/// Guardrail flags contributed per tier slot.
#[derive(Default)]
struct TierFlags {
    framework: BuiltinFlags,
    projects: HashMap<String, BuiltinFlags>,
    agent: BuiltinFlags,
}

type CacheKey = (HookType, Option<String>);

struct CachedChain {
    generation: u64,
    chain: Vec<HookDescriptor>,
}

/// Hooks registered at framework, project and agent tiers.
///
/// Registration is expected at startup but is safe at any time: the
/// underlying registry is swapped copy-on-write, so a resolution in flight
/// keeps the snapshot it started with. Resolved chains are cached per
/// (hook type, project) until the next mutation of any kind.
pub struct HooksRegistry {
    hooks: SharedRegistry<HookDescriptor>,
    overrides: RwLock<TierOverrides<HookOverride>>,
    flags: RwLock<TierFlags>,
    guardrails: GuardrailSet,
    cache: RwLock<HashMap<CacheKey, CachedChain>>,
    generation: AtomicU64,
    observer: Arc<dyn Observer>,
}

impl HooksRegistry {
    pub fn new() -> Self {
        Self {
            hooks: SharedRegistry::default(),
            overrides: RwLock::new(TierOverrides::default()),
            flags: RwLock::new(TierFlags::default()),
            guardrails: GuardrailSet::default(),
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Supply the detectors behind the built-in guardrail hooks.
    pub fn with_guardrails(mut self, guardrails: GuardrailSet) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn register_framework_hook(&self, hook: HookDescriptor) -> Result<(), ConflictError> {
        self.register_hook_with_mode(Tier::Framework, hook, OverrideMode::default())
    }

    /// Register several framework hooks at once.
    ///
    /// Either all of them are published or, on the first conflict, none are.
    pub fn register_framework_hooks(&self, hooks: Vec<HookDescriptor>) -> Result<(), ConflictError> {
        let result = self.hooks.update(|registry| {
            for hook in hooks {
                let name = hook.name().to_string();
                registry.register(Tier::Framework, name, hook)?;
            }
            Ok(())
        });
        self.finish_registration(result)
    }

    pub fn register_project_hook(
        &self,
        hook: HookDescriptor,
        project_id: impl Into<String>,
    ) -> Result<(), ConflictError> {
        self.register_hook_with_mode(Tier::project(project_id), hook, OverrideMode::default())
    }

    pub fn register_agent_hook(&self, hook: HookDescriptor) -> Result<(), ConflictError> {
        self.register_hook_with_mode(Tier::Agent, hook, OverrideMode::default())
    }

    /// Register `hook` under its own name at `tier`.
    ///
    /// `mode` decides how it combines with a lower-tier hook of the same name.
    pub fn register_hook_with_mode(
        &self,
        tier: Tier,
        hook: HookDescriptor,
        mode: OverrideMode,
    ) -> Result<(), ConflictError> {
        let result = self.hooks.update(|registry| {
            let name = hook.name().to_string();
            registry.register_with_mode(tier, name, hook, mode).map(|_| ())
        });
        self.finish_registration(result)
    }

    fn finish_registration(&self, result: Result<(), ConflictError>) -> Result<(), ConflictError> {
        match &result {
            Ok(()) => self.invalidate(),
            Err(err) => {
                tracing::warn!(name = %err.name, tier = %err.tier, "Hook registration conflict");
                self.observer.record_event(&ObserverEvent::RegistryConflict {
                    name: err.name.clone(),
                    tier: err.tier.to_string(),
                });
            }
        }
        result
    }

    /// Add an override directive at `tier`.
    pub fn register_override(&self, tier: Tier, directive: HookOverride) {
        tracing::debug!(tier = %tier, directive = ?directive, "Registered hook override");
        self.overrides
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(tier, directive);
        self.invalidate();
    }

    /// Set the guardrail flags contributed by `tier`, replacing earlier ones.
    pub fn set_builtin_flags(&self, tier: Tier, flags: BuiltinFlags) {
        {
            let mut all = self.flags.write().unwrap_or_else(|e| e.into_inner());
            match tier {
                Tier::Framework => all.framework = flags,
                Tier::Project(id) => {
                    all.projects.insert(id, flags);
                }
                Tier::Agent => all.agent = flags,
            }
        }
        self.invalidate();
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// The executable chain for `hook_type`.
    ///
    /// `call_site` overrides take precedence over every registered override.
    /// For the `post` chain the enabled built-in guardrails come first unless
    /// a hook of the same name is registered.
    pub fn resolve_hooks(
        &self,
        hook_type: HookType,
        project_id: Option<&str>,
        call_site: &[HookOverride],
    ) -> Vec<HookDescriptor> {
        let key = (hook_type, project_id.map(String::from));
        let generation = self.generation.load(Ordering::Acquire);

        if call_site.is_empty() {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(&key)
                && cached.generation == generation
            {
                self.record_resolution(hook_type, project_id, cached.chain.len(), true);
                return cached.chain.clone();
            }
        }

        let chain = self.compose(hook_type, project_id, call_site);

        if call_site.is_empty() {
            self.cache
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(
                    key,
                    CachedChain {
                        generation,
                        chain: chain.clone(),
                    },
                );
        }
        self.record_resolution(hook_type, project_id, chain.len(), false);
        chain
    }

    fn compose(
        &self,
        hook_type: HookType,
        project_id: Option<&str>,
        call_site: &[HookOverride],
    ) -> Vec<HookDescriptor> {
        let snapshot = self.hooks.snapshot();
        let overrides = self
            .overrides
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .merged(project_id, call_site);

        let registered = HookChainComposer::compose(&snapshot, hook_type, project_id, &overrides);
        if hook_type != HookType::Post {
            return registered;
        }

        let flags = {
            let all = self.flags.read().unwrap_or_else(|e| e.into_inner());
            let project = project_id.and_then(|id| all.projects.get(id));
            BuiltinFlags::resolve(&all.framework, project, Some(&all.agent))
        };

        let mut chain: Vec<HookDescriptor> = self
            .guardrails
            .hooks(&flags)
            .into_iter()
            .filter(|hook| snapshot.lookup(hook.name(), project_id).is_none())
            .filter_map(|hook| {
                let name = hook.name().to_string();
                HookChainComposer::apply_override(&name, hook, &overrides)
            })
            .collect();
        chain.extend(registered);
        chain
    }

    fn record_resolution(
        &self,
        hook_type: HookType,
        project_id: Option<&str>,
        hooks: usize,
        cached: bool,
    ) {
        self.observer.record_event(&ObserverEvent::ChainResolved {
            hook_type: hook_type.to_string(),
            project_id: project_id.map(String::from),
            hooks,
            cached,
        });
    }

    /// Names of framework-tier hooks, in registration order.
    pub fn list_framework_hooks(&self) -> Vec<String> {
        self.hooks
            .snapshot()
            .entries(TierLevel::Framework, None)
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Projects with at least one hook registered, sorted.
    pub fn list_project_ids(&self) -> Vec<String> {
        self.hooks
            .snapshot()
            .project_ids()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Describe the effective hook registered as `name`.
    pub fn get_hook_info(&self, name: &str, project_id: Option<&str>) -> Option<HookInfo> {
        let snapshot = self.hooks.snapshot();
        let winner = snapshot.lookup(name, project_id)?;
        let resolved = snapshot.resolve(name, project_id)?;

        Some(HookInfo {
            name: name.to_string(),
            hook_type: resolved.payload.hook_type(),
            on_failure: resolved.payload.on_failure(),
            enabled: resolved.payload.is_enabled(),
            tier: resolved.tier,
            project_id: winner.tier.project_id().map(String::from),
            override_mode: winner.override_mode,
            registered_at: snapshot
                .lineage(name, project_id)
                .iter()
                .map(|entry| entry.tier.level())
                .collect(),
        })
    }
}

impl Default for HooksRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hooks::bundled::{CONTENT_SAFETY_HOOK, PII_FILTER_HOOK};
    use crate::hooks::hook::{FnHook, HookOutcome};
    use crate::observability::recording::RecordingObserver;

    fn hook(name: &str, hook_type: HookType) -> HookDescriptor {
        FnHook::new(name, hook_type, |event| Ok(HookOutcome::pass(event))).into_descriptor()
    }

    fn names(chain: &[HookDescriptor]) -> Vec<String> {
        chain.iter().map(|h| h.name().to_string()).collect()
    }

    fn guardrails() -> GuardrailSet {
        GuardrailSet::new()
            .with_content_check(|_: &str| -> Result<(), String> { Ok(()) })
            .with_pii_redactor(|_: &str| -> Option<String> { None })
    }

    #[test]
    fn test_registration_routes_to_tiers() {
        let registry = HooksRegistry::new();
        registry.register_framework_hook(hook("log", HookType::Pre)).unwrap();
        registry
            .register_project_hook(hook("audit", HookType::Pre), "acme")
            .unwrap();
        registry.register_agent_hook(hook("trace", HookType::Pre)).unwrap();

        assert_eq!(
            names(&registry.resolve_hooks(HookType::Pre, Some("acme"), &[])),
            vec!["log", "audit", "trace"]
        );
        assert_eq!(registry.list_framework_hooks(), vec!["log"]);
        assert_eq!(registry.list_project_ids(), vec!["acme"]);
    }

    #[test]
    fn test_conflict_is_reported_and_recorded() {
        let (observer, events, _) = RecordingObserver::new();
        let registry = HooksRegistry::new().with_observer(Arc::new(observer));
        registry.register_agent_hook(hook("audit", HookType::Post)).unwrap();

        let err = registry
            .register_agent_hook(hook("audit", HookType::Post))
            .unwrap_err();
        assert_eq!(err.tier, TierLevel::Agent);
        assert!(events.lock().unwrap().contains(&ObserverEvent::RegistryConflict {
            name: "audit".into(),
            tier: "agent".into(),
        }));
    }

    #[test]
    fn test_batch_registration_is_atomic() {
        let registry = HooksRegistry::new();
        registry.register_framework_hook(hook("b", HookType::Pre)).unwrap();

        let result = registry.register_framework_hooks(vec![
            hook("a", HookType::Pre),
            hook("b", HookType::Pre),
        ]);
        assert!(result.is_err());
        assert_eq!(registry.list_framework_hooks(), vec!["b"]);
    }

    #[test]
    fn test_cache_serves_until_next_registration() {
        let (observer, events, _) = RecordingObserver::new();
        let registry = HooksRegistry::new().with_observer(Arc::new(observer));
        registry.register_framework_hook(hook("a", HookType::Pre)).unwrap();

        registry.resolve_hooks(HookType::Pre, None, &[]);
        registry.resolve_hooks(HookType::Pre, None, &[]);
        registry.register_agent_hook(hook("b", HookType::Pre)).unwrap();
        let chain = registry.resolve_hooks(HookType::Pre, None, &[]);
        assert_eq!(names(&chain), vec!["a", "b"]);

        let cached: Vec<bool> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::ChainResolved { cached, .. } => Some(*cached),
                _ => None,
            })
            .collect();
        assert_eq!(cached, vec![false, true, false]);
    }

    #[test]
    fn test_tier_overrides_merge_with_call_site_last() {
        let registry = HooksRegistry::new();
        registry.register_framework_hook(hook("a", HookType::Pre)).unwrap();
        registry.register_framework_hook(hook("b", HookType::Pre)).unwrap();
        registry.register_override(Tier::Framework, HookOverride::disable("a"));
        registry.register_override(
            Tier::project("acme"),
            HookOverride::replace("a", hook("a2", HookType::Pre)),
        );

        assert_eq!(names(&registry.resolve_hooks(HookType::Pre, None, &[])), vec!["b"]);
        assert_eq!(
            names(&registry.resolve_hooks(HookType::Pre, Some("acme"), &[])),
            vec!["a2", "b"]
        );
        assert_eq!(
            names(&registry.resolve_hooks(
                HookType::Pre,
                Some("acme"),
                &[HookOverride::disable("b")]
            )),
            vec!["a2"]
        );
    }

    #[test]
    fn test_builtins_lead_post_chain_per_tier_flags() {
        let registry = HooksRegistry::new().with_guardrails(guardrails());
        registry.register_framework_hook(hook("audit", HookType::Post)).unwrap();
        registry.set_builtin_flags(
            Tier::Framework,
            BuiltinFlags {
                content_safety: Some(true),
                ..Default::default()
            },
        );
        registry.set_builtin_flags(
            Tier::project("acme"),
            BuiltinFlags {
                pii_filter: Some(true),
                ..Default::default()
            },
        );

        assert_eq!(
            names(&registry.resolve_hooks(HookType::Post, None, &[])),
            vec![CONTENT_SAFETY_HOOK, "audit"]
        );
        assert_eq!(
            names(&registry.resolve_hooks(HookType::Post, Some("acme"), &[])),
            vec![CONTENT_SAFETY_HOOK, PII_FILTER_HOOK, "audit"]
        );

        registry.set_builtin_flags(
            Tier::Agent,
            BuiltinFlags {
                content_safety: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(
            names(&registry.resolve_hooks(HookType::Post, Some("acme"), &[])),
            vec![PII_FILTER_HOOK, "audit"]
        );
        // Built-ins never join the pre chain.
        assert!(registry.resolve_hooks(HookType::Pre, Some("acme"), &[]).is_empty());
    }

    #[test]
    fn test_builtin_can_be_disabled_by_override() {
        let registry = HooksRegistry::new().with_guardrails(guardrails());
        registry.set_builtin_flags(
            Tier::Framework,
            BuiltinFlags {
                content_safety: Some(true),
                pii_filter: Some(true),
                ..Default::default()
            },
        );
        let chain = registry.resolve_hooks(
            HookType::Post,
            None,
            &[HookOverride::disable(CONTENT_SAFETY_HOOK)],
        );
        assert_eq!(names(&chain), vec![PII_FILTER_HOOK]);
    }

    #[test]
    fn test_hook_info_reports_winner_and_lineage() {
        let registry = HooksRegistry::new();
        registry.register_framework_hook(hook("audit", HookType::Post)).unwrap();
        registry
            .register_hook_with_mode(
                Tier::project("acme"),
                hook("audit", HookType::Post),
                OverrideMode::Wrap,
            )
            .unwrap();

        let info = registry.get_hook_info("audit", Some("acme")).unwrap();
        assert_eq!(info.tier, TierLevel::Project);
        assert_eq!(info.project_id.as_deref(), Some("acme"));
        assert_eq!(info.override_mode, OverrideMode::Wrap);
        assert_eq!(info.registered_at, vec![TierLevel::Framework, TierLevel::Project]);

        assert!(info.enabled);

        let info = registry.get_hook_info("audit", None).unwrap();
        assert_eq!(info.tier, TierLevel::Framework);
        assert!(registry.get_hook_info("missing", None).is_none());
    }

    #[test]
    fn test_disabled_hook_stays_registered_but_leaves_chain() {
        let registry = HooksRegistry::new();
        registry.register_framework_hook(hook("log", HookType::Pre)).unwrap();
        registry
            .register_project_hook(
                FnHook::new("log", HookType::Pre, |event| Ok(HookOutcome::pass(event)))
                    .with_enabled(false)
                    .into_descriptor(),
                "acme",
            )
            .unwrap();

        assert_eq!(names(&registry.resolve_hooks(HookType::Pre, None, &[])), vec!["log"]);
        assert!(registry.resolve_hooks(HookType::Pre, Some("acme"), &[]).is_empty());

        let info = registry.get_hook_info("log", Some("acme")).unwrap();
        assert!(!info.enabled);
        assert_eq!(info.tier, TierLevel::Project);
    }
}
