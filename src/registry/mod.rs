//! Three-tier priority registry.
//!
//! Entries are registered at one of three levels:
//!
//! - **Framework**: built-in defaults (lowest priority)
//! - **Project**: entries scoped to one project id
//! - **Agent**: entries owned by a single agent (highest priority)
//!
//! A name is unique within a tier slot; the same name at several tiers is the
//! override mechanism, and the highest tier wins at resolution time. Hooks and
//! tools both sit on top of [`TieredRegistry`].

pub mod overrides;
pub mod shared;
pub mod tier;
pub mod tiered;

pub use overrides::{Directive, TierOverrides};
pub use shared::SharedRegistry;
pub use tier::{OverrideMode, Tier, TierLevel};
pub use tiered::{ConflictError, Overlay, RegistryEntry, Resolved, TieredRegistry};
