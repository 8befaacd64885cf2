//! Tiered tool registry.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::observability::{NoopObserver, Observer, ObserverEvent};
use crate::registry::{
    ConflictError, OverrideMode, SharedRegistry, Tier, TierLevel, TierOverrides, TieredRegistry,
};
use crate::tools::overrides::ToolOverride;
use crate::tools::tool::{ToolDescriptor, ToolSchema};

/// Introspection record for one registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub schema: ToolSchema,
    /// Tier of the winning registration.
    pub tier: TierLevel,
    pub project_id: Option<String>,
    pub override_mode: OverrideMode,
}

/// Tools registered at framework, project and agent tiers.
///
/// The same contract as the hook registry with tools as payload. A resolved
/// tool set lists every visible name once, at the position where it was
/// first registered, with the payload of its highest tier.
pub struct ToolRegistry {
    tools: SharedRegistry<ToolDescriptor>,
    overrides: RwLock<TierOverrides<ToolOverride>>,
    observer: Arc<dyn Observer>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: SharedRegistry::default(),
            overrides: RwLock::new(TierOverrides::default()),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn register_framework_tool(&self, tool: ToolDescriptor) -> Result<(), ConflictError> {
        self.register_tool_with_mode(Tier::Framework, tool, OverrideMode::default())
    }

    pub fn register_project_tool(
        &self,
        tool: ToolDescriptor,
        project_id: impl Into<String>,
    ) -> Result<(), ConflictError> {
        self.register_tool_with_mode(Tier::project(project_id), tool, OverrideMode::default())
    }

    pub fn register_agent_tool(&self, tool: ToolDescriptor) -> Result<(), ConflictError> {
        self.register_tool_with_mode(Tier::Agent, tool, OverrideMode::default())
    }

    pub fn register_tool_with_mode(
        &self,
        tier: Tier,
        tool: ToolDescriptor,
        mode: OverrideMode,
    ) -> Result<(), ConflictError> {
        self.tools
            .update(|registry| {
                let name = tool.name().to_string();
                registry.register_with_mode(tier, name, tool, mode).map(|_| ())
            })
            .inspect_err(|err| self.report_conflict(err))
    }

    fn report_conflict(&self, err: &ConflictError) {
        tracing::warn!(name = %err.name, tier = %err.tier, "Tool registration conflict");
        self.observer.record_event(&ObserverEvent::RegistryConflict {
            name: err.name.clone(),
            tier: err.tier.to_string(),
        });
    }

    /// Add an override directive at `tier`.
    pub fn register_override(&self, tier: Tier, directive: ToolOverride) {
        tracing::debug!(tier = %tier, directive = ?directive, "Registered tool override");
        self.overrides
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(tier, directive);
    }

    /// Remove `name` from every tool set resolved at or above `tier`.
    pub fn disable_tool(&self, tier: Tier, name: impl Into<String>) {
        self.register_override(tier, ToolOverride::disable(name));
    }

    /// The effective tool set for one agent run.
    ///
    /// `agent_tools` join the agent tier for this resolution only; a name that
    /// collides with a registered agent tool (or repeats within
    /// `agent_tools`) is a [`ConflictError`]. `call_site` overrides take
    /// precedence over every registered override.
    pub fn resolve_tools(
        &self,
        agent_tools: Vec<ToolDescriptor>,
        project_id: Option<&str>,
        call_site: &[ToolOverride],
    ) -> Result<Vec<ToolDescriptor>, ConflictError> {
        let snapshot = self.tools.snapshot();
        let mut scoped: TieredRegistry<ToolDescriptor>;
        let registry = if agent_tools.is_empty() {
            snapshot.as_ref()
        } else {
            scoped = TieredRegistry::clone(&snapshot);
            for tool in agent_tools {
                let name = tool.name().to_string();
                scoped
                    .register(Tier::Agent, name, tool)
                    .inspect_err(|err| self.report_conflict(err))?;
            }
            &scoped
        };

        let overrides = self
            .overrides
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .merged(project_id, call_site);

        let mut seen = HashSet::new();
        let mut tools = Vec::new();
        for level in TierLevel::ASCENDING {
            for entry in registry.entries(level, project_id) {
                if !seen.insert(entry.name.as_str()) {
                    continue;
                }
                let Some(resolved) = registry.resolve(&entry.name, project_id) else {
                    continue;
                };
                let tool = match overrides.get(&entry.name) {
                    Some(directive) => {
                        tracing::debug!(tool = %entry.name, directive = ?directive, "Applying tool override");
                        directive.apply(resolved.payload)
                    }
                    None => Some(resolved.payload),
                };
                tools.extend(tool);
            }
        }

        tracing::debug!(
            project_id = project_id.unwrap_or(""),
            tools = tools.len(),
            "Resolved tool set"
        );
        Ok(tools)
    }

    /// Names of framework-tier tools, in registration order.
    pub fn list_framework_tools(&self) -> Vec<String> {
        self.tools
            .snapshot()
            .entries(TierLevel::Framework, None)
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Projects with at least one tool registered, sorted.
    pub fn list_project_ids(&self) -> Vec<String> {
        self.tools
            .snapshot()
            .project_ids()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Describe the effective tool registered as `name`.
    pub fn get_tool_info(&self, name: &str, project_id: Option<&str>) -> Option<ToolInfo> {
        let snapshot = self.tools.snapshot();
        let winner = snapshot.lookup(name, project_id)?;
        let resolved = snapshot.resolve(name, project_id)?;

        Some(ToolInfo {
            schema: resolved.payload.schema(),
            tier: resolved.tier,
            project_id: winner.tier.project_id().map(String::from),
            override_mode: winner.override_mode,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::tools::overrides::InheritSpec;
    use crate::tools::tool::FnTool;

    fn tool(name: &str, description: &str) -> ToolDescriptor {
        let tag = description.to_string();
        FnTool::new(name, description, move |_| Ok(json!(tag)))
            .into_descriptor()
    }

    fn names(tools: &[ToolDescriptor]) -> Vec<&str> {
        tools.iter().map(|t| t.name()).collect()
    }

    fn sample() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register_framework_tool(tool("search", "framework search")).unwrap();
        registry.register_framework_tool(tool("fetch", "framework fetch")).unwrap();
        registry
            .register_project_tool(tool("search", "acme search"), "acme")
            .unwrap();
        registry
            .register_project_tool(tool("crm", "acme crm"), "acme")
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_highest_tier_wins_in_first_position() {
        let registry = sample();
        let tools = registry
            .resolve_tools(vec![tool("fetch", "agent fetch")], Some("acme"), &[])
            .unwrap();

        assert_eq!(names(&tools), vec!["search", "fetch", "crm"]);
        assert_eq!(tools[0].description(), "acme search");
        assert_eq!(tools[1].execute(json!({})).await.unwrap(), json!("agent fetch"));

        let tools = registry.resolve_tools(Vec::new(), None, &[]).unwrap();
        assert_eq!(names(&tools), vec!["search", "fetch"]);
        assert_eq!(tools[0].description(), "framework search");
    }

    #[test]
    fn test_agent_tool_conflicts() {
        let registry = sample();
        registry.register_agent_tool(tool("notes", "agent notes")).unwrap();

        let err = registry
            .resolve_tools(vec![tool("notes", "again")], None, &[])
            .err()
            .unwrap();
        assert_eq!(err.name, "notes");
        assert_eq!(err.tier, TierLevel::Agent);

        assert!(registry
            .resolve_tools(vec![tool("x", "1"), tool("x", "2")], None, &[])
            .is_err());
        // Per-call agent tools never leak into the registry.
        assert!(registry.get_tool_info("x", None).is_none());
    }

    #[test]
    fn test_project_disable_and_call_site_override() {
        let registry = sample();
        registry.disable_tool(Tier::project("acme"), "fetch");
        registry.register_override(
            Tier::Framework,
            ToolOverride::inherit("search", InheritSpec::new().with_description("tuned")),
        );

        let tools = registry.resolve_tools(Vec::new(), Some("acme"), &[]).unwrap();
        assert_eq!(names(&tools), vec!["search", "crm"]);
        assert_eq!(tools[0].description(), "tuned");

        let tools = registry
            .resolve_tools(Vec::new(), None, &[ToolOverride::disable("search")])
            .unwrap();
        assert_eq!(names(&tools), vec!["fetch"]);
    }

    #[test]
    fn test_introspection() {
        let registry = sample();
        registry
            .register_tool_with_mode(
                Tier::Agent,
                tool("search", "agent search"),
                OverrideMode::Inherit,
            )
            .unwrap();

        assert_eq!(registry.list_framework_tools(), vec!["search", "fetch"]);
        assert_eq!(registry.list_project_ids(), vec!["acme"]);

        let info = registry.get_tool_info("search", Some("acme")).unwrap();
        assert_eq!(info.tier, TierLevel::Agent);
        assert_eq!(info.project_id, None);
        assert_eq!(info.override_mode, OverrideMode::Inherit);
        assert_eq!(info.schema.description, "agent search");

        assert!(registry.get_tool_info("crm", None).is_none());
        assert_eq!(
            registry.get_tool_info("crm", Some("acme")).unwrap().project_id.as_deref(),
            Some("acme")
        );
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let registry = sample();
        let err = registry
            .register_project_tool(tool("crm", "dup"), "acme")
            .unwrap_err();
        assert_eq!(err.tier, TierLevel::Project);
        assert_eq!(err.project_id.as_deref(), Some("acme"));
    }
}
