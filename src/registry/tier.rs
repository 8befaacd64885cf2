//! Tier levels and registration slots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority level of a registration.
///
/// Ordered: `Framework < Project < Agent`. When the same name is registered at
/// several levels, the highest one wins at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    /// Built-in defaults shipped with the framework (lowest priority).
    Framework,
    /// Entries owned by a single project.
    Project,
    /// Entries owned by a single agent (highest priority).
    Agent,
}

impl TierLevel {
    /// All levels, lowest priority first.
    pub const ASCENDING: [TierLevel; 3] =
        [TierLevel::Framework, TierLevel::Project, TierLevel::Agent];

    /// All levels, highest priority first.
    pub const DESCENDING: [TierLevel; 3] =
        [TierLevel::Agent, TierLevel::Project, TierLevel::Framework];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierLevel::Framework => "framework",
            TierLevel::Project => "project",
            TierLevel::Agent => "agent",
        }
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete registration slot.
///
/// Project entries are scoped by project id: two projects may register the
/// same name without conflicting, and resolution for one project never sees
/// another project's entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Framework,
    Project(String),
    Agent,
}

impl Tier {
    /// Shorthand for `Tier::Project(id.into())`.
    pub fn project(project_id: impl Into<String>) -> Self {
        Tier::Project(project_id.into())
    }

    /// The priority level of this slot.
    pub fn level(&self) -> TierLevel {
        match self {
            Tier::Framework => TierLevel::Framework,
            Tier::Project(_) => TierLevel::Project,
            Tier::Agent => TierLevel::Agent,
        }
    }

    /// The project id for project slots.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Tier::Project(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Project(id) => write!(f, "project '{id}'"),
            other => f.write_str(other.level().as_str()),
        }
    }
}

/// How a higher-tier entry combines with the lower-tier entry it shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    /// Keep the lower-tier behavior, take metadata from the higher tier.
    Inherit,
    /// Run the higher-tier payload first, then the lower-tier one.
    Wrap,
    /// Use the higher-tier payload as is.
    #[default]
    Replace,
}
