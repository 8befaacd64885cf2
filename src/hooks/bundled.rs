//! Built-in guardrail hooks.
//!
//! Four optional guardrails run at the head of the `post` chain:
//!
//! | Hook | Detector | On hit |
//! |------|----------|--------|
//! | `builtin:content_safety` | [`ContentCheck`] | fails the hook |
//! | `builtin:pii_filter` | [`PiiRedactor`] | replaces the content |
//! | `builtin:quality_check` | [`QualityScorer`] | fails below the minimum |
//! | `builtin:length_check` | none | fails above `max_output_length` |
//!
//! Detection itself is supplied by the caller; these hooks only adapt the
//! detectors to the hook interface. Whether each guardrail is active is a
//! tri-state flag per tier, resolved agent over project over framework.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::hooks::hook::{
    Hook, HookContext, HookDescriptor, HookError, HookEvent, HookOutcome, HookType,
};

pub const CONTENT_SAFETY_HOOK: &str = "builtin:content_safety";
pub const PII_FILTER_HOOK: &str = "builtin:pii_filter";
pub const QUALITY_CHECK_HOOK: &str = "builtin:quality_check";
pub const LENGTH_CHECK_HOOK: &str = "builtin:length_check";

const DEFAULT_MIN_QUALITY_SCORE: f64 = 0.6;

/// Rejects unsafe content. `Err` carries the reason.
pub trait ContentCheck: Send + Sync {
    fn check(&self, content: &str) -> Result<(), String>;
}

impl<F> ContentCheck for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn check(&self, content: &str) -> Result<(), String> {
        self(content)
    }
}

/// Redacts personal data. `None` means nothing was found.
pub trait PiiRedactor: Send + Sync {
    fn redact(&self, content: &str) -> Option<String>;
}

impl<F> PiiRedactor for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn redact(&self, content: &str) -> Option<String> {
        self(content)
    }
}

/// Scores output quality in `[0, 1]`.
pub trait QualityScorer: Send + Sync {
    fn score(&self, content: &str) -> f64;
}

impl<F> QualityScorer for F
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    fn score(&self, content: &str) -> f64 {
        self(content)
    }
}

/// Guardrail switches contributed by one tier. `None` defers to lower tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuiltinFlags {
    pub content_safety: Option<bool>,
    pub pii_filter: Option<bool>,
    pub quality_check: Option<bool>,
    pub min_quality_score: Option<f64>,
    /// Longest output accepted, in characters.
    pub max_output_length: Option<usize>,
}

impl BuiltinFlags {
    /// Merge tiers, highest priority wins for every flag that is set.
    pub fn resolve(
        framework: &BuiltinFlags,
        project: Option<&BuiltinFlags>,
        agent: Option<&BuiltinFlags>,
    ) -> ResolvedBuiltins {
        let layers = [agent, project, Some(framework)];
        let pick = |f: fn(&BuiltinFlags) -> Option<bool>| {
            layers.iter().flatten().find_map(|flags| f(flags)).unwrap_or(false)
        };

        ResolvedBuiltins {
            content_safety: pick(|f| f.content_safety),
            pii_filter: pick(|f| f.pii_filter),
            quality_check: pick(|f| f.quality_check),
            min_quality_score: layers
                .iter()
                .flatten()
                .find_map(|flags| flags.min_quality_score)
                .unwrap_or(DEFAULT_MIN_QUALITY_SCORE),
            max_output_length: layers
                .iter()
                .flatten()
                .find_map(|flags| flags.max_output_length),
        }
    }
}

/// Effective guardrail switches for one resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBuiltins {
    pub content_safety: bool,
    pub pii_filter: bool,
    pub quality_check: bool,
    pub min_quality_score: f64,
    /// `None` leaves output length unchecked.
    pub max_output_length: Option<usize>,
}

/// The detectors available to the built-in guardrails.
#[derive(Clone, Default)]
pub struct GuardrailSet {
    content_check: Option<Arc<dyn ContentCheck>>,
    pii_redactor: Option<Arc<dyn PiiRedactor>>,
    quality_scorer: Option<Arc<dyn QualityScorer>>,
}

impl GuardrailSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_check(mut self, check: impl ContentCheck + 'static) -> Self {
        self.content_check = Some(Arc::new(check));
        self
    }

    pub fn with_pii_redactor(mut self, redactor: impl PiiRedactor + 'static) -> Self {
        self.pii_redactor = Some(Arc::new(redactor));
        self
    }

    pub fn with_quality_scorer(mut self, scorer: impl QualityScorer + 'static) -> Self {
        self.quality_scorer = Some(Arc::new(scorer));
        self
    }

    /// Guardrail hooks that are switched on and have a detector, in order.
    ///
    /// An enabled guardrail without a detector is skipped with a warning.
    pub fn hooks(&self, flags: &ResolvedBuiltins) -> Vec<HookDescriptor> {
        let mut hooks: Vec<HookDescriptor> = Vec::new();

        if flags.content_safety {
            match &self.content_check {
                Some(check) => hooks.push(Arc::new(ContentSafetyHook {
                    check: Arc::clone(check),
                })),
                None => missing_detector(CONTENT_SAFETY_HOOK),
            }
        }
        if flags.pii_filter {
            match &self.pii_redactor {
                Some(redactor) => hooks.push(Arc::new(PiiFilterHook {
                    redactor: Arc::clone(redactor),
                })),
                None => missing_detector(PII_FILTER_HOOK),
            }
        }
        if flags.quality_check {
            match &self.quality_scorer {
                Some(scorer) => hooks.push(Arc::new(QualityCheckHook {
                    scorer: Arc::clone(scorer),
                    min_score: flags.min_quality_score,
                })),
                None => missing_detector(QUALITY_CHECK_HOOK),
            }
        }
        if let Some(max_length) = flags.max_output_length {
            hooks.push(Arc::new(LengthCheckHook { max_length }));
        }
        hooks
    }
}

fn missing_detector(hook: &str) {
    tracing::warn!(hook, "Guardrail enabled but no detector configured, skipping");
}

/// Fails output that the content check rejects.
pub struct ContentSafetyHook {
    check: Arc<dyn ContentCheck>,
}

#[async_trait]
impl Hook for ContentSafetyHook {
    fn name(&self) -> &str {
        CONTENT_SAFETY_HOOK
    }

    fn hook_type(&self) -> HookType {
        HookType::Post
    }

    async fn invoke(&self, event: HookEvent, _ctx: &HookContext) -> Result<HookOutcome, HookError> {
        if let Some(content) = event.content() {
            self.check
                .check(content)
                .map_err(|reason| HookError::failed(format!("unsafe content: {reason}")))?;
        }
        Ok(HookOutcome::pass(event))
    }
}

/// Replaces output with its redacted form.
pub struct PiiFilterHook {
    redactor: Arc<dyn PiiRedactor>,
}

#[async_trait]
impl Hook for PiiFilterHook {
    fn name(&self) -> &str {
        PII_FILTER_HOOK
    }

    fn hook_type(&self) -> HookType {
        HookType::Post
    }

    async fn invoke(&self, event: HookEvent, _ctx: &HookContext) -> Result<HookOutcome, HookError> {
        match event.content().and_then(|c| self.redactor.redact(c)) {
            Some(redacted) => {
                tracing::debug!(hook = PII_FILTER_HOOK, "Redacted personal data");
                Ok(HookOutcome::pass(event.with_content(redacted)))
            }
            None => Ok(HookOutcome::pass(event)),
        }
    }
}

/// Fails output scoring below the minimum.
pub struct QualityCheckHook {
    scorer: Arc<dyn QualityScorer>,
    min_score: f64,
}

#[async_trait]
impl Hook for QualityCheckHook {
    fn name(&self) -> &str {
        QUALITY_CHECK_HOOK
    }

    fn hook_type(&self) -> HookType {
        HookType::Post
    }

    async fn invoke(&self, event: HookEvent, _ctx: &HookContext) -> Result<HookOutcome, HookError> {
        if let Some(content) = event.content() {
            let score = self.scorer.score(content);
            if score < self.min_score {
                return Err(HookError::failed(format!(
                    "quality score {score:.2} below minimum {:.2}",
                    self.min_score
                )));
            }
        }
        Ok(HookOutcome::pass(event))
    }
}

/// Fails output longer than `max_length` characters.
pub struct LengthCheckHook {
    max_length: usize,
}

#[async_trait]
impl Hook for LengthCheckHook {
    fn name(&self) -> &str {
        LENGTH_CHECK_HOOK
    }

    fn hook_type(&self) -> HookType {
        HookType::Post
    }

    async fn invoke(&self, event: HookEvent, _ctx: &HookContext) -> Result<HookOutcome, HookError> {
        if let Some(content) = event.content() {
            let length = content.chars().count();
            if length > self.max_length {
                return Err(HookError::failed(format!(
                    "output too long: {length} > {}",
                    self.max_length
                )));
            }
        }
        Ok(HookOutcome::pass(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::SessionId;

    fn output(text: &str) -> HookEvent {
        HookEvent::ModelInvocation {
            session_id: SessionId::from("s"),
            output: text.into(),
            usage: None,
        }
    }

    fn set() -> GuardrailSet {
        GuardrailSet::new()
            .with_content_check(|c: &str| {
                if c.contains("attack") {
                    Err("violent".to_string())
                } else {
                    Ok(())
                }
            })
            .with_pii_redactor(|c: &str| {
                c.contains("@").then(|| c.replace("bob@example.com", "[email]"))
            })
            .with_quality_scorer(|c: &str| if c.len() > 5 { 0.9 } else { 0.1 })
    }

    #[test]
    fn test_flags_resolve_agent_over_project_over_framework() {
        let framework = BuiltinFlags {
            content_safety: Some(true),
            pii_filter: Some(true),
            ..Default::default()
        };
        let project = BuiltinFlags {
            quality_check: Some(true),
            min_quality_score: Some(0.8),
            max_output_length: Some(200),
            ..Default::default()
        };
        let agent = BuiltinFlags {
            pii_filter: Some(false),
            ..Default::default()
        };

        let resolved = BuiltinFlags::resolve(&framework, Some(&project), Some(&agent));
        assert!(resolved.content_safety);
        assert!(!resolved.pii_filter);
        assert!(resolved.quality_check);
        assert_eq!(resolved.min_quality_score, 0.8);
        assert_eq!(resolved.max_output_length, Some(200));

        let resolved = BuiltinFlags::resolve(&framework, None, None);
        assert!(resolved.pii_filter);
        assert!(!resolved.quality_check);
        assert_eq!(resolved.min_quality_score, DEFAULT_MIN_QUALITY_SCORE);
        assert_eq!(resolved.max_output_length, None);
    }

    #[test]
    fn test_hooks_follow_flags_and_detectors() {
        let all_on = ResolvedBuiltins {
            content_safety: true,
            pii_filter: true,
            quality_check: true,
            min_quality_score: 0.5,
            max_output_length: None,
        };
        let names: Vec<String> = set()
            .hooks(&all_on)
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec![CONTENT_SAFETY_HOOK, PII_FILTER_HOOK, QUALITY_CHECK_HOOK]);

        // No detectors: nothing to run even when enabled.
        assert!(GuardrailSet::new().hooks(&all_on).is_empty());
    }

    #[tokio::test]
    async fn test_builtin_hooks_behave() {
        let flags = ResolvedBuiltins {
            content_safety: true,
            pii_filter: true,
            quality_check: true,
            min_quality_score: 0.5,
            max_output_length: None,
        };
        let hooks = set().hooks(&flags);
        let ctx = HookContext::default();

        let err = hooks[0].invoke(output("attack now"), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("violent"));

        let redacted = hooks[1]
            .invoke(output("mail bob@example.com"), &ctx)
            .await
            .unwrap();
        assert_eq!(redacted, HookOutcome::pass(output("mail [email]")));

        assert!(hooks[2].invoke(output("meh"), &ctx).await.is_err());
        assert!(hooks[2].invoke(output("a fine answer"), &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_length_check_needs_no_detector() {
        let flags = ResolvedBuiltins {
            content_safety: false,
            pii_filter: false,
            quality_check: false,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            max_output_length: Some(5),
        };
        let hooks = GuardrailSet::new().hooks(&flags);
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].name(), LENGTH_CHECK_HOOK);

        let ctx = HookContext::default();
        // Counted in characters, not bytes.
        assert!(hooks[0].invoke(output("日本語です"), &ctx).await.is_ok());
        let err = hooks[0].invoke(output("too long"), &ctx).await.unwrap_err();
        assert_eq!(err, HookError::failed("output too long: 8 > 5"));
    }
}
