//! Coaching replies for the chosen next action.

use tracing::{debug, warn};

use crate::generative::{GenerationError, GenerativePlanner, build_coach_prompt};
use crate::model::{Assignment, PlanItem, clamp_minutes};

/// Words that mark a question about the assignment's own instructions.
const INSTRUCTION_WORDS: [&str; 5] =
    ["instruction", "direction", "description", "detail", "requirement"];

/// Whether `user_message` asks what the assignment itself says.
pub fn asks_for_instructions(user_message: &str) -> bool {
    let lower = user_message.to_lowercase();
    INSTRUCTION_WORDS.iter().any(|word| lower.contains(word))
}

/// The deterministic line quoting `assignment`'s description, if it has one.
pub fn instructions_line(assignment: &Assignment) -> Option<String> {
    let description = assignment.description.as_deref().map(str::trim)?;
    if description.is_empty() {
        return None;
    }
    Some(format!("Instructions for {}: {description}", assignment.title))
}

/// The deterministic coaching line for `action`.
pub fn coach_message_for_action(action: &PlanItem) -> String {
    let minutes = clamp_minutes(action.estimated_minutes);
    format!("Do this now: {}. Set a {minutes}-minute timer and start.", action.title)
}

/// Produces short, supportive replies that always point at one action.
#[derive(Debug, Clone)]
pub struct Coach {
    generative: GenerativePlanner,
}

impl Coach {
    pub fn new(generative: GenerativePlanner) -> Self {
        Self { generative }
    }

    /// Reply to `user_message`, steering toward `action`.
    ///
    /// Uses the generator when one is configured. Any failure falls back to
    /// [`coach_message_for_action`]. A generated reply that never names the
    /// action gets the deterministic line appended.
    pub async fn reply(&self, user_message: &str, action: &PlanItem) -> String {
        let fallback = coach_message_for_action(action);
        let minutes = clamp_minutes(action.estimated_minutes);
        let prompt = build_coach_prompt(user_message, action, minutes);

        match self.generative.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim();
                if text.contains(action.title.as_str()) {
                    text.to_owned()
                } else {
                    debug!("coach reply did not name the action; appending it");
                    format!("{text}\n\n{fallback}")
                }
            }
            Err(GenerationError::NotConfigured) => fallback,
            Err(e) => {
                warn!(error = %e, "coach generation failed");
                fallback
            }
        }
    }

    /// Like [`Coach::reply`], and when the student asks for instructions the
    /// source assignment's description is appended after the reply. The
    /// description never reaches the generator.
    pub async fn reply_about(
        &self,
        user_message: &str,
        action: &PlanItem,
        source: Option<&Assignment>,
    ) -> String {
        let text = self.reply(user_message, action).await;
        if !asks_for_instructions(user_message) {
            return text;
        }
        match source.and_then(instructions_line) {
            Some(line) => format!("{text}\n\n{line}"),
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::generative::TextGenerator;
    use crate::model::PlanStatus;

    struct Reply(Result<String, GenerationError>);

    #[async_trait]
    impl TextGenerator for Reply {
        fn name(&self) -> &str {
            "reply"
        }

        async fn generate_text(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    fn action(minutes: u32) -> PlanItem {
        PlanItem {
            id: "p1".into(),
            title: "Start Homework 1A: 15 min".into(),
            due_date: None,
            estimated_minutes: minutes,
            status: PlanStatus::Todo,
            source_assignment_id: Some("a1".into()),
        }
    }

    fn coach(reply: Result<String, GenerationError>) -> Coach {
        Coach::new(GenerativePlanner::new(Arc::new(Reply(reply)), Duration::from_secs(5)))
    }

    #[test]
    fn deterministic_message_clamps_minutes() {
        assert_eq!(
            coach_message_for_action(&action(45)),
            "Do this now: Start Homework 1A: 15 min. Set a 20-minute timer and start."
        );
        assert!(coach_message_for_action(&action(3)).contains("10-minute"));
    }

    #[tokio::test]
    async fn disabled_generator_uses_deterministic_message() {
        let coach = Coach::new(GenerativePlanner::disabled());
        let text = coach.reply("help", &action(15)).await;
        assert_eq!(text, coach_message_for_action(&action(15)));
    }

    #[tokio::test]
    async fn generated_reply_naming_the_action_is_kept() {
        let coach = coach(Ok(" You've got this. Start Homework 1A: 15 min right now. ".into()));
        let text = coach.reply("I'm stuck", &action(15)).await;
        assert_eq!(text, "You've got this. Start Homework 1A: 15 min right now.");
    }

    #[tokio::test]
    async fn generated_reply_without_the_action_gets_it_appended() {
        let coach = coach(Ok("Take a breath.".into()));
        let text = coach.reply("I'm stuck", &action(15)).await;
        assert!(text.starts_with("Take a breath."));
        assert!(text.contains("Start Homework 1A: 15 min"));
    }

    fn homework() -> Assignment {
        Assignment::new("a1", "Homework 1A", "Math")
            .description("Test material the students will use.")
    }

    #[test]
    fn instruction_questions_are_recognized() {
        assert!(asks_for_instructions("What are the instructions?"));
        assert!(asks_for_instructions("any DETAILS on this one"));
        assert!(!asks_for_instructions("I'm overwhelmed"));
    }

    #[test]
    fn blank_description_has_no_instructions_line() {
        assert!(instructions_line(&Assignment::new("a1", "Quiz", "Math")).is_none());
        let blank = Assignment::new("a1", "Quiz", "Math").description("  ");
        assert!(instructions_line(&blank).is_none());
        assert_eq!(
            instructions_line(&homework()).as_deref(),
            Some("Instructions for Homework 1A: Test material the students will use.")
        );
    }

    #[tokio::test]
    async fn instructions_are_appended_but_never_sent_to_the_generator() {
        struct Recording(std::sync::Mutex<Vec<String>>);

        #[async_trait]
        impl TextGenerator for Recording {
            fn name(&self) -> &str {
                "recording"
            }

            async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
                self.0.lock().unwrap().push(prompt.to_owned());
                Ok("Start Homework 1A: 15 min, you can do it.".into())
            }
        }

        let generator = Arc::new(Recording(std::sync::Mutex::default()));
        let coach = Coach::new(GenerativePlanner::new(generator.clone(), Duration::from_secs(5)));
        let text = coach
            .reply_about("What are the instructions?", &action(15), Some(&homework()))
            .await;

        assert!(text.starts_with("Start Homework 1A: 15 min, you can do it."));
        assert!(text.contains("Test material the students will use."));
        let prompts = generator.0.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains("Test material"));
    }

    #[tokio::test]
    async fn unrelated_question_skips_instructions() {
        let coach = Coach::new(GenerativePlanner::disabled());
        let text = coach.reply_about("help", &action(15), Some(&homework())).await;
        assert_eq!(text, coach_message_for_action(&action(15)));
    }

    #[tokio::test]
    async fn failed_generation_falls_back() {
        let coach = coach(Err(GenerationError::RequestFailed("HTTP 429".into())));
        let text = coach.reply("hi", &action(15)).await;
        assert_eq!(text, coach_message_for_action(&action(15)));
    }
}
