//! Generic three-tier registry with same-tier conflict detection.

use std::collections::HashMap;
use std::fmt;

use crate::registry::tier::{OverrideMode, Tier, TierLevel};

/// A name was registered twice at the same tier slot.
///
/// Registering the same name at a *different* tier is the override mechanism
/// and never produces this error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{name}' already registered at {tier} tier{}", project_suffix(.project_id))]
pub struct ConflictError {
    pub name: String,
    pub tier: TierLevel,
    pub project_id: Option<String>,
}

fn project_suffix(project_id: &Option<String>) -> String {
    project_id
        .as_deref()
        .map(|id| format!(" (project '{id}')"))
        .unwrap_or_default()
}

/// One registration.
#[derive(Clone)]
pub struct RegistryEntry<T> {
    pub name: String,
    pub tier: Tier,
    pub payload: T,
    pub override_mode: OverrideMode,
}

impl<T> fmt::Debug for RegistryEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("override_mode", &self.override_mode)
            .finish_non_exhaustive()
    }
}

/// Combines a higher-tier payload with the lower-tier payload it shadows.
///
/// Implemented by payload types that support `wrap` and `inherit` overrides.
/// `Replace` is handled by the registry and never reaches `overlay`.
pub trait Overlay: Clone {
    fn overlay(upper: &Self, lower: &Self, mode: OverrideMode) -> Self;
}

/// The effective payload for a name after folding every tier.
#[derive(Clone)]
pub struct Resolved<T> {
    pub name: String,
    /// Level of the winning (highest) registration.
    pub tier: TierLevel,
    pub payload: T,
}

/// Entries of one tier slot, in registration order.
#[derive(Clone)]
struct TierSlot<T> {
    entries: Vec<RegistryEntry<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for TierSlot<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> TierSlot<T> {
    fn get(&self, name: &str) -> Option<&RegistryEntry<T>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    fn insert(&mut self, entry: RegistryEntry<T>) -> &RegistryEntry<T> {
        let idx = self.entries.len();
        self.index.insert(entry.name.clone(), idx);
        self.entries.push(entry);
        &self.entries[idx]
    }
}

/// Keyed store of named entries at three priority tiers.
///
/// `register` is the only mutator. Once startup registration is done the
/// registry is treated as read-only; see [`SharedRegistry`] for hot
/// re-registration.
///
/// [`SharedRegistry`]: crate::registry::SharedRegistry
#[derive(Clone)]
pub struct TieredRegistry<T> {
    framework: TierSlot<T>,
    projects: HashMap<String, TierSlot<T>>,
    agent: TierSlot<T>,
}

impl<T> Default for TieredRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TieredRegistry<T> {
    pub fn new() -> Self {
        Self {
            framework: TierSlot::default(),
            projects: HashMap::new(),
            agent: TierSlot::default(),
        }
    }

    /// Register `payload` under `name` with the default `Replace` override mode.
    pub fn register(
        &mut self,
        tier: Tier,
        name: impl Into<String>,
        payload: T,
    ) -> Result<&RegistryEntry<T>, ConflictError> {
        self.register_with_mode(tier, name, payload, OverrideMode::default())
    }

    /// Register `payload` under `name` at `tier`.
    ///
    /// Fails when `name` already exists at exactly this tier slot.
    pub fn register_with_mode(
        &mut self,
        tier: Tier,
        name: impl Into<String>,
        payload: T,
        override_mode: OverrideMode,
    ) -> Result<&RegistryEntry<T>, ConflictError> {
        let name = name.into();
        let slot = match &tier {
            Tier::Framework => &mut self.framework,
            Tier::Project(id) => self.projects.entry(id.clone()).or_default(),
            Tier::Agent => &mut self.agent,
        };

        if slot.get(&name).is_some() {
            return Err(ConflictError {
                name,
                tier: tier.level(),
                project_id: tier.project_id().map(String::from),
            });
        }

        tracing::debug!(name = %name, tier = %tier, mode = ?override_mode, "Registered entry");
        Ok(slot.insert(RegistryEntry {
            name,
            tier,
            payload,
            override_mode,
        }))
    }

    fn slot(&self, level: TierLevel, project_id: Option<&str>) -> Option<&TierSlot<T>> {
        match level {
            TierLevel::Framework => Some(&self.framework),
            TierLevel::Project => project_id.and_then(|id| self.projects.get(id)),
            TierLevel::Agent => Some(&self.agent),
        }
    }

    /// Entries at exactly one tier, in registration order.
    ///
    /// The project tier is only visible for a given `project_id`.
    pub fn entries(&self, level: TierLevel, project_id: Option<&str>) -> &[RegistryEntry<T>] {
        self.slot(level, project_id)
            .map(|slot| slot.entries.as_slice())
            .unwrap_or(&[])
    }

    /// The highest-tier entry for `name`, if any tier has it.
    pub fn lookup(&self, name: &str, project_id: Option<&str>) -> Option<&RegistryEntry<T>> {
        TierLevel::DESCENDING
            .iter()
            .find_map(|&level| self.slot(level, project_id)?.get(name))
    }

    /// Every entry for `name`, lowest tier first.
    pub fn lineage(&self, name: &str, project_id: Option<&str>) -> Vec<&RegistryEntry<T>> {
        TierLevel::ASCENDING
            .iter()
            .filter_map(|&level| self.slot(level, project_id)?.get(name))
            .collect()
    }

    /// Whether `name` exists at exactly this tier slot.
    pub fn contains(&self, tier: &Tier, name: &str) -> bool {
        self.slot(tier.level(), tier.project_id())
            .is_some_and(|slot| slot.get(name).is_some())
    }

    /// Project ids that have at least one registration.
    pub fn project_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.projects.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Total number of registrations across all tier slots.
    pub fn len(&self) -> usize {
        self.framework.entries.len()
            + self.agent.entries.len()
            + self.projects.values().map(|s| s.entries.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Overlay> TieredRegistry<T> {
    /// Fold every tier's entry for `name` into the effective payload.
    ///
    /// Starts from the lowest tier and applies each higher entry with its own
    /// override mode. Returns `None` if `name` is not registered anywhere.
    pub fn resolve(&self, name: &str, project_id: Option<&str>) -> Option<Resolved<T>> {
        let mut lineage = self.lineage(name, project_id).into_iter();
        let base = lineage.next()?;
        let mut tier = base.tier.level();
        let mut payload = base.payload.clone();

        for upper in lineage {
            payload = match upper.override_mode {
                OverrideMode::Replace => upper.payload.clone(),
                mode => T::overlay(&upper.payload, &payload, mode),
            };
            tier = upper.tier.level();
        }

        Some(Resolved {
            name: name.to_string(),
            tier,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl Overlay for Item {
        fn overlay(upper: &Self, lower: &Self, mode: OverrideMode) -> Self {
            match mode {
                OverrideMode::Wrap => Item(format!("{}({})", upper.0, lower.0)),
                OverrideMode::Inherit => Item(format!("{}~{}", lower.0, upper.0)),
                OverrideMode::Replace => upper.clone(),
            }
        }
    }

    fn item(s: &str) -> Item {
        Item(s.to_string())
    }

    #[test]
    fn test_same_tier_duplicate_conflicts() {
        let mut registry = TieredRegistry::new();
        registry.register(Tier::Framework, "a", item("first")).unwrap();

        let err = registry
            .register(Tier::Framework, "a", item("second"))
            .unwrap_err();
        assert_eq!(err.name, "a");
        assert_eq!(err.tier, TierLevel::Framework);
        assert_eq!(err.project_id, None);
        assert!(err.to_string().contains("framework"));

        // The original registration is untouched.
        assert_eq!(registry.lookup("a", None).unwrap().payload, item("first"));
    }

    #[test]
    fn test_same_name_at_other_tiers_is_allowed() {
        let mut registry = TieredRegistry::new();
        registry.register(Tier::Framework, "a", item("f")).unwrap();
        registry.register(Tier::project("p"), "a", item("p")).unwrap();
        registry.register(Tier::Agent, "a", item("g")).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_project_conflict_is_scoped_per_project() {
        let mut registry = TieredRegistry::new();
        registry.register(Tier::project("p1"), "a", item("1")).unwrap();
        registry.register(Tier::project("p2"), "a", item("2")).unwrap();

        let err = registry
            .register(Tier::project("p1"), "a", item("3"))
            .unwrap_err();
        assert_eq!(err.tier, TierLevel::Project);
        assert_eq!(err.project_id.as_deref(), Some("p1"));
        assert!(err.to_string().contains("project 'p1'"));
        assert_eq!(registry.project_ids(), vec!["p1", "p2"]);
    }

    #[test]
    fn test_lookup_returns_highest_tier() {
        let mut registry = TieredRegistry::new();
        registry.register(Tier::Framework, "a", item("f")).unwrap();
        registry.register(Tier::project("p"), "a", item("p")).unwrap();

        assert_eq!(registry.lookup("a", Some("p")).unwrap().payload, item("p"));
        // Without the project id the project tier is invisible.
        assert_eq!(registry.lookup("a", None).unwrap().payload, item("f"));
        assert_eq!(registry.lookup("a", Some("other")).unwrap().payload, item("f"));
        assert!(registry.lookup("missing", Some("p")).is_none());

        registry.register(Tier::Agent, "a", item("g")).unwrap();
        assert_eq!(registry.lookup("a", Some("p")).unwrap().payload, item("g"));
    }

    #[test]
    fn test_entries_preserve_insertion_order() {
        let mut registry = TieredRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Tier::Framework, name, item(name)).unwrap();
        }
        registry.register(Tier::Agent, "agent-only", item("g")).unwrap();

        let names: Vec<&str> = registry
            .entries(TierLevel::Framework, None)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.entries(TierLevel::Agent, None).len(), 1);
        assert!(registry.entries(TierLevel::Project, Some("none")).is_empty());
    }

    #[test]
    fn test_resolve_folds_override_modes() {
        let mut registry = TieredRegistry::new();
        registry.register(Tier::Framework, "a", item("base")).unwrap();
        registry
            .register_with_mode(Tier::project("p"), "a", item("proj"), OverrideMode::Wrap)
            .unwrap();
        registry
            .register_with_mode(Tier::Agent, "a", item("agent"), OverrideMode::Inherit)
            .unwrap();

        let resolved = registry.resolve("a", Some("p")).unwrap();
        assert_eq!(resolved.tier, TierLevel::Agent);
        assert_eq!(resolved.payload, item("proj(base)~agent"));

        // Replace discards everything below it.
        registry.register(Tier::project("q"), "a", item("q")).unwrap();
        let resolved = registry.resolve("a", Some("q")).unwrap();
        assert_eq!(resolved.payload, item("q~agent"));

        assert!(registry.resolve("missing", None).is_none());
    }

    #[test]
    fn test_contains_checks_exact_slot() {
        let mut registry = TieredRegistry::new();
        registry.register(Tier::project("p"), "a", item("p")).unwrap();
        assert!(registry.contains(&Tier::project("p"), "a"));
        assert!(!registry.contains(&Tier::project("q"), "a"));
        assert!(!registry.contains(&Tier::Framework, "a"));
    }
}
