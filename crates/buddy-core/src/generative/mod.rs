//! Generative planning: asks an external language model for a plan.
//!
//! This module only moves text. It builds a prompt from a minimized
//! assignment projection, calls the configured [`TextGenerator`] under a
//! timeout, and hands back whatever text came out. Parsing and validation
//! belong to [`crate::rails`].
//!
//! ```text
//! PlanOrchestrator
//!     |
//!     v
//! GenerativePlanner --request_plan(assignments, week_start)--> raw text
//!     |
//!     v
//! Arc<dyn TextGenerator> (OpenAiGenerator, fakes)
//! ```

pub mod openai;
pub mod prompt;
pub mod trait_def;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::model::Assignment;

pub use openai::OpenAiGenerator;
pub use prompt::{AssignmentSummary, assignments_json, build_coach_prompt, build_plan_prompt};
pub use trait_def::{GenerationError, TextGenerator};

/// Optional generator plus the timeout applied to every call.
#[derive(Clone)]
pub struct GenerativePlanner {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl GenerativePlanner {
    /// A planner backed by `generator`.
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator: Some(generator),
            timeout,
        }
    }

    /// A planner with no generator; every request fails with
    /// [`GenerationError::NotConfigured`].
    pub fn disabled() -> Self {
        Self {
            generator: None,
            timeout: Duration::ZERO,
        }
    }

    /// Whether a generator is configured.
    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Ask the generator for a weekly plan. Returns raw, unvalidated text.
    pub async fn request_plan(
        &self,
        assignments: &[Assignment],
        week_start: NaiveDate,
    ) -> Result<String, GenerationError> {
        let prompt = build_plan_prompt(assignments, week_start);
        self.generate(&prompt).await
    }

    /// Run `prompt` through the generator under the configured timeout.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(GenerationError::NotConfigured)?;

        match tokio::time::timeout(self.timeout, generator.generate_text(prompt)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
            Ok(result) => result,
            Err(_elapsed) => Err(GenerationError::RequestFailed(format!(
                "{} timed out after {}s",
                generator.name(),
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

impl std::fmt::Debug for GenerativePlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativePlanner")
            .field("generator", &self.generator.as_ref().map(|g| g.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Records prompts and replies with a canned result after an optional
    /// delay.
    struct Canned {
        reply: Result<String, GenerationError>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(reply: Result<String, GenerationError>) -> Self {
            Self {
                reply,
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_owned());
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()
    }

    #[tokio::test]
    async fn disabled_planner_is_not_configured() {
        let planner = GenerativePlanner::disabled();
        assert!(!planner.is_enabled());
        let err = planner.request_plan(&[], week()).await.unwrap_err();
        assert_eq!(err, GenerationError::NotConfigured);
    }

    #[tokio::test]
    async fn request_plan_sends_prompt_and_returns_raw_text() {
        let canned = Arc::new(Canned::new(Ok("not json at all".into())));
        let planner = GenerativePlanner::new(canned.clone(), Duration::from_secs(5));
        let assignments = vec![Assignment::new("a1", "Essay", "English").description("secret")];

        let text = planner.request_plan(&assignments, week()).await.unwrap();
        assert_eq!(text, "not json at all");

        let prompts = canned.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("weekStart must be 2026-01-12."));
        assert!(!prompts[0].contains("secret"));
    }

    #[tokio::test]
    async fn whitespace_reply_is_empty_response() {
        let generator = Arc::new(Canned::new(Ok("  \n".into())));
        let planner = GenerativePlanner::new(generator, Duration::from_secs(5));
        let err = planner.generate("p").await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyResponse);
    }

    #[tokio::test]
    async fn upstream_errors_pass_through() {
        let planner = GenerativePlanner::new(
            Arc::new(Canned::new(Err(GenerationError::RequestFailed("HTTP 503".into())))),
            Duration::from_secs(5),
        );
        let err = planner.generate("p").await.unwrap_err();
        assert_eq!(err, GenerationError::RequestFailed("HTTP 503".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let mut canned = Canned::new(Ok("{}".into()));
        canned.delay = Duration::from_secs(60);
        let planner = GenerativePlanner::new(Arc::new(canned), Duration::from_secs(10));

        let err = planner.generate("p").await.unwrap_err();
        assert!(
            matches!(&err, GenerationError::RequestFailed(msg) if msg.contains("timed out")),
            "expected timeout, got {err:?}"
        );
    }
}
