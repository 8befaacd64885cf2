//! Tiered hook/tool resolution and bounded execution for agent loops.
//!
//! - [`registry`]: the generic three-tier registry (framework, project, agent)
//! - [`hooks`]: hook registration, chain composition and execution
//! - [`tools`]: the same tiered contract for callable tools
//! - [`guards`]: per-session tool-call, model-invocation and token guards
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tierguard::config::GuardsConfig;
//! use tierguard::guards::{ExecutionGuardEngine, SessionId};
//! use tierguard::hooks::{ChainExecutor, HookContext, HookEvent, HookType, HooksRegistry};
//!
//! # async fn run() -> Result<(), tierguard::Error> {
//! let hooks = HooksRegistry::new();
//! let engine = ExecutionGuardEngine::new(GuardsConfig::default());
//! engine.register_into(&hooks)?;
//!
//! let chain = hooks.resolve_hooks(HookType::Tool, Some("acme"), &[]);
//! let event = HookEvent::ToolCall {
//!     session_id: SessionId::new(),
//!     tool_name: "search".into(),
//!     parameters: serde_json::json!({ "query": "rust" }),
//! };
//! let result = ChainExecutor::new()
//!     .run(&chain, event, &HookContext::for_project("acme"))
//!     .await?;
//! assert!(!result.is_bounded());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod guards;
pub mod hooks;
pub mod observability;
pub mod registry;
pub mod tools;

pub use config::Config;
pub use error::{ConfigError, Error, Result};
