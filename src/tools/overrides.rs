//! Tool override directives and the composite tools they produce.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::registry::{Directive, OverrideMode, Overlay};
use crate::tools::tool::{Tool, ToolDescriptor, ToolError};

/// Rewrites a tool's parameters before it runs.
pub type ParamsFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Rewrites a tool's result after it runs.
pub type ResultFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Changes to one parameter under an inherit override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamOverride {
    pub description: Option<String>,
    /// Injected when the caller leaves the parameter out.
    pub default: Option<Value>,
    /// Removed from the schema and stripped from incoming parameters.
    pub hidden: bool,
}

/// A parameter added under an inherit override.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamConfig {
    pub name: String,
    /// JSON Schema type, e.g. `"string"`.
    pub json_type: String,
    pub description: String,
    pub default: Option<Value>,
    pub required: bool,
}

impl ParamConfig {
    pub fn new(name: impl Into<String>, json_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            json_type: json_type.into(),
            description: String::new(),
            default: None,
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Metadata changes applied by an inherit override. Behavior is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InheritSpec {
    pub description: Option<String>,
    pub param_overrides: BTreeMap<String, ParamOverride>,
    pub additional_params: Vec<ParamConfig>,
    pub hidden_params: Vec<String>,
}

impl InheritSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hide(mut self, param: impl Into<String>) -> Self {
        self.hidden_params.push(param.into());
        self
    }

    pub fn override_param(mut self, param: impl Into<String>, change: ParamOverride) -> Self {
        self.param_overrides.insert(param.into(), change);
        self
    }

    pub fn add_param(mut self, param: ParamConfig) -> Self {
        self.additional_params.push(param);
        self
    }

    fn is_hidden(&self, param: &str) -> bool {
        self.hidden_params.iter().any(|p| p == param)
            || self.param_overrides.get(param).is_some_and(|p| p.hidden)
    }

    /// Defaults to inject, in a stable order.
    fn defaults(&self) -> Vec<(String, Value)> {
        let added = self
            .additional_params
            .iter()
            .filter_map(|p| Some((p.name.clone(), p.default.clone()?)));
        let overridden = self
            .param_overrides
            .iter()
            .filter_map(|(name, p)| Some((name.clone(), p.default.clone()?)));
        added.chain(overridden).collect()
    }

    /// Apply the metadata changes to `schema`.
    fn rewrite_schema(&self, schema: &Value) -> Value {
        let mut schema = schema.clone();
        let Some(object) = schema.as_object_mut() else {
            return schema;
        };

        let properties = object
            .entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(properties) = properties.as_object_mut() {
            for param in &self.additional_params {
                let mut prop = serde_json::json!({ "type": param.json_type });
                if !param.description.is_empty() {
                    prop["description"] = Value::String(param.description.clone());
                }
                if let Some(default) = &param.default {
                    prop["default"] = default.clone();
                }
                properties.insert(param.name.clone(), prop);
            }
            for (name, change) in &self.param_overrides {
                if let Some(prop) = properties.get_mut(name).and_then(Value::as_object_mut) {
                    if let Some(description) = &change.description {
                        prop.insert("description".into(), Value::String(description.clone()));
                    }
                    if let Some(default) = &change.default {
                        prop.insert("default".into(), default.clone());
                    }
                }
            }
            properties.retain(|name, _| !self.is_hidden(name));
        }

        let required = object
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(required) = required.as_array_mut() {
            for param in self.additional_params.iter().filter(|p| p.required) {
                required.push(Value::String(param.name.clone()));
            }
            required.retain(|name| name.as_str().is_none_or(|n| !self.is_hidden(n)));
        }
        schema
    }
}

/// Runs a parameter pre-processor, the inner tool, then a result
/// post-processor.
pub struct WrappedTool {
    inner: ToolDescriptor,
    pre: Option<ParamsFn>,
    post: Option<ResultFn>,
}

impl WrappedTool {
    pub fn new(inner: ToolDescriptor, pre: Option<ParamsFn>, post: Option<ResultFn>) -> Self {
        Self { inner, pre, post }
    }
}

#[async_trait]
impl Tool for WrappedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params = match &self.pre {
            Some(pre) => pre(params),
            None => params,
        };
        let result = self.inner.execute(params).await?;
        Ok(match &self.post {
            Some(post) => post(result),
            None => result,
        })
    }
}

/// Feeds the outer tool's result to the inner tool as its parameters.
///
/// Produced by a higher-tier registration in `wrap` mode.
pub struct ChainedTool {
    outer: ToolDescriptor,
    inner: ToolDescriptor,
}

#[async_trait]
impl Tool for ChainedTool {
    fn name(&self) -> &str {
        self.outer.name()
    }

    fn description(&self) -> &str {
        self.outer.description()
    }

    fn parameters_schema(&self) -> Value {
        self.outer.parameters_schema()
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let threaded = self.outer.execute(params).await?;
        self.inner.execute(threaded).await
    }
}

/// Keeps `base`'s behavior under a different description and schema.
///
/// Hidden parameters are stripped from incoming calls and defaults are filled
/// in for parameters the caller left out. Added parameters marked required
/// must be present once defaults are applied.
pub struct InheritedTool {
    base: ToolDescriptor,
    description: String,
    schema: Value,
    hidden: Vec<String>,
    defaults: Vec<(String, Value)>,
    required: Vec<String>,
}

impl InheritedTool {
    /// Apply an [`InheritSpec`] to `base`.
    pub fn new(base: ToolDescriptor, spec: &InheritSpec) -> Self {
        let description = spec
            .description
            .clone()
            .unwrap_or_else(|| base.description().to_string());
        let schema = spec.rewrite_schema(&base.parameters_schema());
        let mut hidden = spec.hidden_params.clone();
        hidden.extend(
            spec.param_overrides
                .iter()
                .filter(|(_, p)| p.hidden)
                .map(|(name, _)| name.clone()),
        );

        Self {
            base,
            description,
            schema,
            hidden,
            defaults: spec.defaults(),
            required: spec
                .additional_params
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.clone())
                .collect(),
        }
    }

    /// Keep `base`'s behavior with `metadata`'s description and schema.
    pub fn with_metadata(base: ToolDescriptor, metadata: &dyn Tool) -> Self {
        Self {
            description: metadata.description().to_string(),
            schema: metadata.parameters_schema(),
            base,
            hidden: Vec::new(),
            defaults: Vec::new(),
            required: Vec::new(),
        }
    }
}

#[async_trait]
impl Tool for InheritedTool {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, mut params: Value) -> Result<Value, ToolError> {
        if let Some(object) = params.as_object_mut() {
            for name in &self.hidden {
                object.remove(name);
            }
            for (name, default) in &self.defaults {
                object
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        if let Some(missing) = self
            .required
            .iter()
            .find(|name| params.get(name.as_str()).is_none_or(Value::is_null))
        {
            return Err(ToolError::InvalidParameters(format!(
                "missing required parameter '{missing}'"
            )));
        }
        self.base.execute(params).await
    }
}

impl Overlay for ToolDescriptor {
    fn overlay(upper: &Self, lower: &Self, mode: OverrideMode) -> Self {
        match mode {
            OverrideMode::Replace => Arc::clone(upper),
            OverrideMode::Wrap => Arc::new(ChainedTool {
                outer: Arc::clone(upper),
                inner: Arc::clone(lower),
            }),
            OverrideMode::Inherit => {
                Arc::new(InheritedTool::with_metadata(Arc::clone(lower), upper.as_ref()))
            }
        }
    }
}

/// What a [`ToolOverride`] does to its target.
#[derive(Clone)]
pub enum ToolOverrideMode {
    Disable,
    Replace(ToolDescriptor),
    Wrap {
        pre: Option<ParamsFn>,
        post: Option<ResultFn>,
    },
    Inherit(InheritSpec),
}

/// Explicit directive applied to a named tool at resolution time.
#[derive(Clone)]
pub struct ToolOverride {
    pub target: String,
    pub mode: ToolOverrideMode,
}

impl ToolOverride {
    pub fn disable(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mode: ToolOverrideMode::Disable,
        }
    }

    pub fn replace(target: impl Into<String>, tool: ToolDescriptor) -> Self {
        Self {
            target: target.into(),
            mode: ToolOverrideMode::Replace(tool),
        }
    }

    pub fn wrap(target: impl Into<String>, pre: Option<ParamsFn>, post: Option<ResultFn>) -> Self {
        Self {
            target: target.into(),
            mode: ToolOverrideMode::Wrap { pre, post },
        }
    }

    pub fn inherit(target: impl Into<String>, spec: InheritSpec) -> Self {
        Self {
            target: target.into(),
            mode: ToolOverrideMode::Inherit(spec),
        }
    }

    /// Apply to `tool`. `None` means the tool is removed.
    pub fn apply(&self, tool: ToolDescriptor) -> Option<ToolDescriptor> {
        match &self.mode {
            ToolOverrideMode::Disable => None,
            ToolOverrideMode::Replace(replacement) => Some(Arc::clone(replacement)),
            ToolOverrideMode::Wrap { pre, post } => Some(Arc::new(WrappedTool::new(
                tool,
                pre.clone(),
                post.clone(),
            ))),
            ToolOverrideMode::Inherit(spec) => Some(Arc::new(InheritedTool::new(tool, spec))),
        }
    }
}

impl fmt::Debug for ToolOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.mode {
            ToolOverrideMode::Disable => "disable".to_string(),
            ToolOverrideMode::Replace(t) => format!("replace({})", t.name()),
            ToolOverrideMode::Wrap { .. } => "wrap".to_string(),
            ToolOverrideMode::Inherit(_) => "inherit".to_string(),
        };
        f.debug_struct("ToolOverride")
            .field("target", &self.target)
            .field("mode", &mode)
            .finish()
    }
}

impl Directive for ToolOverride {
    fn target(&self) -> &str {
        &self.target
    }
}
