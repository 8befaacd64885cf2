//! Turns tiered hook registrations into one ordered chain.

use std::collections::{HashMap, HashSet};

use crate::hooks::hook::{HookDescriptor, HookType};
use crate::hooks::overlay::HookOverride;
use crate::registry::TieredRegistry;

/// Builds executable hook chains from a [`TieredRegistry`].
pub struct HookChainComposer;

impl HookChainComposer {
    /// Compose the chain for `hook_type`.
    ///
    /// Tiers are walked in the hook type's order. A name registered at several
    /// tiers is emitted once, at the position of its winning tier, with the
    /// payload folded across every tier. A disabled winner is left out before
    /// any override applies. `overrides` are keyed by target name.
    pub fn compose(
        registry: &TieredRegistry<HookDescriptor>,
        hook_type: HookType,
        project_id: Option<&str>,
        overrides: &HashMap<String, HookOverride>,
    ) -> Vec<HookDescriptor> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();

        for level in hook_type.tier_order() {
            for entry in registry.entries(level, project_id) {
                let wins_here = registry
                    .lookup(&entry.name, project_id)
                    .is_some_and(|winner| winner.tier.level() == level);
                if !wins_here || !seen.insert(entry.name.as_str()) {
                    continue;
                }

                let Some(resolved) = registry.resolve(&entry.name, project_id) else {
                    continue;
                };
                if resolved.payload.hook_type() != hook_type {
                    continue;
                }
                if !resolved.payload.is_enabled() {
                    tracing::debug!(hook = %entry.name, "Skipping disabled hook");
                    continue;
                }

                chain.extend(Self::apply_override(&entry.name, resolved.payload, overrides));
            }
        }

        tracing::debug!(
            hook_type = %hook_type,
            project_id = project_id.unwrap_or(""),
            hooks = chain.len(),
            "Composed hook chain"
        );
        chain
    }

    /// Apply the override targeting `name`, if any.
    ///
    /// `None` means the hook was disabled.
    pub fn apply_override(
        name: &str,
        hook: HookDescriptor,
        overrides: &HashMap<String, HookOverride>,
    ) -> Option<HookDescriptor> {
        match overrides.get(name) {
            Some(directive) => {
                tracing::debug!(hook = name, directive = ?directive, "Applying hook override");
                directive.apply(hook)
            }
            None => Some(hook),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::guards::SessionId;
    use crate::hooks::hook::{FnHook, HookContext, HookEvent, HookOutcome};
    use crate::registry::{OverrideMode, Tier};

    fn hook(name: &str, hook_type: HookType) -> HookDescriptor {
        tagged(name, name, hook_type)
    }

    /// A hook registered as `name` that appends `tag` to the content.
    fn tagged(name: &str, tag: &str, hook_type: HookType) -> HookDescriptor {
        let tag = tag.to_string();
        FnHook::new(name, hook_type, move |event: HookEvent| {
            let text = format!("{}|{tag}", event.content().unwrap_or_default());
            Ok(HookOutcome::pass(event.with_content(text)))
        })
        .into_descriptor()
    }

    fn input(text: &str) -> HookEvent {
        HookEvent::Input {
            session_id: SessionId::from("s"),
            content: text.into(),
        }
    }

    async fn run(chain: &[HookDescriptor], event: HookEvent) -> HookEvent {
        let mut event = event;
        for hook in chain {
            match hook.invoke(event, &HookContext::default()).await.unwrap() {
                HookOutcome::Continue { event: next, .. } => event = next,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        event
    }

    fn names(chain: &[HookDescriptor]) -> Vec<&str> {
        chain.iter().map(|h| h.name()).collect()
    }

    fn sample_registry() -> TieredRegistry<HookDescriptor> {
        let mut registry = TieredRegistry::new();
        registry
            .register(Tier::Framework, "f1", hook("f1", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Framework, "shared", hook("shared", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Framework, "f2", hook("f2", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::project("p"), "p1", hook("p1", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Agent, "shared", hook("shared", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Agent, "a1", hook("a1", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Framework, "post1", hook("post1", HookType::Post))
            .unwrap();
        registry
            .register(Tier::Agent, "post2", hook("post2", HookType::Post))
            .unwrap();
        registry
    }

    #[test]
    fn test_pre_chain_runs_framework_to_agent() {
        let registry = sample_registry();
        let chain = HookChainComposer::compose(&registry, HookType::Pre, Some("p"), &HashMap::new());
        // "shared" moves to the agent slot where it wins.
        assert_eq!(names(&chain), vec!["f1", "f2", "p1", "shared", "a1"]);
    }

    #[test]
    fn test_post_chain_runs_agent_to_framework() {
        let registry = sample_registry();
        let chain =
            HookChainComposer::compose(&registry, HookType::Post, Some("p"), &HashMap::new());
        assert_eq!(names(&chain), vec!["post2", "post1"]);
    }

    #[test]
    fn test_project_hooks_need_their_project() {
        let registry = sample_registry();
        let chain = HookChainComposer::compose(&registry, HookType::Pre, None, &HashMap::new());
        assert_eq!(names(&chain), vec!["f1", "f2", "shared", "a1"]);
    }

    #[test]
    fn test_overrides_disable_replace_wrap() {
        let registry = sample_registry();
        let overrides: HashMap<String, HookOverride> = [
            HookOverride::disable("f1"),
            HookOverride::replace("f2", hook("f2-new", HookType::Pre)),
            HookOverride::wrap("a1", hook("outer", HookType::Pre)),
        ]
        .into_iter()
        .map(|o| (o.target.clone(), o))
        .collect();

        let chain = HookChainComposer::compose(&registry, HookType::Pre, Some("p"), &overrides);
        assert_eq!(names(&chain), vec!["f2-new", "p1", "shared", "a1"]);
    }

    #[tokio::test]
    async fn test_winning_payload_is_folded_across_tiers() {
        let mut registry = TieredRegistry::new();
        registry
            .register(Tier::Framework, "x", hook("base", HookType::Pre))
            .unwrap();
        registry
            .register_with_mode(Tier::Agent, "x", hook("outer", HookType::Pre), OverrideMode::Wrap)
            .unwrap();

        let chain = HookChainComposer::compose(&registry, HookType::Pre, None, &HashMap::new());
        assert_eq!(chain.len(), 1);

        let event = HookEvent::Input {
            session_id: SessionId::from("s"),
            content: "in".into(),
        };
        let outcome = chain[0].invoke(event.clone(), &HookContext::default()).await.unwrap();
        assert_eq!(outcome, HookOutcome::pass(event.with_content("in|outer|base")));
    }

    #[tokio::test]
    async fn test_agent_replacement_runs_its_own_payload_at_agent_slot() {
        let mut registry = TieredRegistry::new();
        registry
            .register(Tier::Framework, "x", tagged("x", "framework-x", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Framework, "f1", hook("f1", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Agent, "a1", hook("a1", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Agent, "x", tagged("x", "agent-x", HookType::Pre))
            .unwrap();

        let chain = HookChainComposer::compose(&registry, HookType::Pre, None, &HashMap::new());
        assert_eq!(names(&chain), vec!["f1", "a1", "x"]);

        let event = run(&chain, input("in")).await;
        assert_eq!(event, input("in|f1|a1|agent-x"));
    }

    #[tokio::test]
    async fn test_disabled_winner_is_skipped_even_when_wrapped() {
        let mut registry = TieredRegistry::new();
        registry
            .register(Tier::Framework, "f1", hook("f1", HookType::Pre))
            .unwrap();
        registry
            .register(Tier::Framework, "quiet", hook("quiet", HookType::Pre))
            .unwrap();
        let disabled = FnHook::new("quiet", HookType::Pre, |event| Ok(HookOutcome::pass(event)))
            .with_enabled(false)
            .into_descriptor();
        registry.register(Tier::Agent, "quiet", disabled).unwrap();

        let overrides: HashMap<String, HookOverride> =
            [HookOverride::wrap("quiet", hook("outer", HookType::Pre))]
                .into_iter()
                .map(|o| (o.target.clone(), o))
                .collect();
        let chain = HookChainComposer::compose(&registry, HookType::Pre, None, &overrides);
        assert_eq!(names(&chain), vec!["f1"]);
    }
}
