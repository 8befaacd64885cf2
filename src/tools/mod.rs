//! Callable tools resolved from three priority tiers.
//!
//! Tools follow the same tiered contract as hooks: a name is unique per tier
//! slot, the highest tier wins, and override directives can disable, replace,
//! wrap or inherit a registered tool.

pub mod overrides;
pub mod registry;
pub mod tool;

pub use overrides::{
    ChainedTool, InheritSpec, InheritedTool, ParamConfig, ParamOverride, ParamsFn, ResultFn,
    ToolOverride, ToolOverrideMode, WrappedTool,
};
pub use registry::{ToolInfo, ToolRegistry};
pub use tool::{FnTool, Tool, ToolDescriptor, ToolError, ToolSchema};
