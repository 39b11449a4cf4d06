//! Stage contract: one prompt, one provider call, one new context key.
//!
//! A stage is a pure description. The orchestrator guarantees (by static
//! validation at composition time) that every required key is present
//! before `execute` runs, so a missing key here is a pipeline bug.

use thiserror::Error;

use crate::context::{ContextError, ReportContext};
use crate::lm::{Provider, ProviderError};

/// A single named unit of generation work.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Stage name, used in failures and trace records.
    pub name: String,
    /// Context keys whose values fill the template's `{key}` slots.
    pub requires: Vec<String>,
    /// Context key the stage's raw generated text lands under.
    pub output: String,
    /// Prompt template with `{key}` slots; substitution only.
    pub template: String,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl StageSpec {
    pub fn new(
        name: impl Into<String>,
        requires: &[&str],
        output: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            requires: requires.iter().map(|key| key.to_string()).collect(),
            output: output.into(),
            template: template.into(),
        }
    }

    /// Render the prompt by substituting required context values into
    /// their `{key}` slots.
    pub fn render_prompt(&self, ctx: &ReportContext) -> Result<String, ContextError> {
        let mut prompt = self.template.clone();
        for key in &self.requires {
            let value = ctx.text(key)?;
            prompt = prompt.replace(&format!("{{{key}}}"), value);
        }
        Ok(prompt)
    }

    /// Execute the stage: render, invoke the provider exactly once, and
    /// return the raw generated text under the declared output key.
    /// Provider failure propagates unmodified; there is no retry here.
    pub fn execute(
        &self,
        ctx: &ReportContext,
        provider: &dyn Provider,
    ) -> Result<(String, String), StageError> {
        let prompt = self.render_prompt(ctx)?;
        let text = provider.generate(&prompt)?;
        Ok((self.output.clone(), text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PROFILE_KEY;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoProvider {
        calls: AtomicUsize,
    }

    impl Provider for EchoProvider {
        fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("generated for: {prompt}"))
        }
    }

    #[test]
    fn render_substitutes_required_slots() {
        let mut ctx = ReportContext::new();
        ctx.insert_text(PROFILE_KEY, "loves math").unwrap();
        let stage = StageSpec::new(
            "recommend-majors",
            &[PROFILE_KEY],
            "majors_report",
            "Profile: {profile}. Go.",
        );
        assert_eq!(
            stage.render_prompt(&ctx).unwrap(),
            "Profile: loves math. Go."
        );
    }

    #[test]
    fn render_fails_on_missing_key() {
        let ctx = ReportContext::new();
        let stage = StageSpec::new("s", &[PROFILE_KEY], "out", "{profile}");
        assert!(matches!(
            stage.render_prompt(&ctx),
            Err(ContextError::Missing { .. })
        ));
    }

    #[test]
    fn execute_calls_provider_once_and_returns_output_key() {
        let mut ctx = ReportContext::new();
        ctx.insert_text(PROFILE_KEY, "profile text").unwrap();
        let stage = StageSpec::new("s", &[PROFILE_KEY], "out", "p={profile}");
        let provider = EchoProvider {
            calls: AtomicUsize::new(0),
        };

        let (key, value) = stage.execute(&ctx, &provider).unwrap();
        assert_eq!(key, "out");
        assert_eq!(value, "generated for: p=profile text");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
