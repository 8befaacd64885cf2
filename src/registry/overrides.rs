//! Override directives registered per tier.

use std::collections::HashMap;

use crate::registry::tier::Tier;

/// An explicit directive aimed at a registered entry by name.
pub trait Directive: Clone {
    fn target(&self) -> &str;
}

/// Directives collected at each tier slot.
#[derive(Clone)]
pub struct TierOverrides<D> {
    framework: Vec<D>,
    projects: HashMap<String, Vec<D>>,
    agent: Vec<D>,
}

impl<D> Default for TierOverrides<D> {
    fn default() -> Self {
        Self {
            framework: Vec::new(),
            projects: HashMap::new(),
            agent: Vec::new(),
        }
    }
}

impl<D: Directive> TierOverrides<D> {
    pub fn push(&mut self, tier: Tier, directive: D) {
        match tier {
            Tier::Framework => self.framework.push(directive),
            Tier::Project(id) => self.projects.entry(id).or_default().push(directive),
            Tier::Agent => self.agent.push(directive),
        }
    }

    /// Merge every visible tier plus `call_site` into one directive per target.
    ///
    /// Precedence, lowest first: framework, project, agent, call site. Within
    /// a tier a later directive replaces an earlier one for the same target.
    pub fn merged(&self, project_id: Option<&str>, call_site: &[D]) -> HashMap<String, D> {
        let project = project_id
            .and_then(|id| self.projects.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        self.framework
            .iter()
            .chain(project)
            .chain(&self.agent)
            .chain(call_site)
            .map(|d| (d.target().to_string(), d.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.framework.is_empty() && self.agent.is_empty() && self.projects.is_empty()
    }
}
