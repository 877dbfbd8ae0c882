//! Shared test utilities for buddy integration tests.
//!
//! Scripted fakes for the two collaborator traits, plus small builders for
//! assignments, dates and fixture files. The fakes record every call so tests
//! can assert on what the pipeline asked for.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use buddy_core::generative::{GenerationError, TextGenerator};
use buddy_core::model::Assignment;
use buddy_core::source::{CourseworkError, CourseworkSource};

/// Wednesday 2026-01-14; its week starts Monday 2026-01-12.
pub fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 14).expect("valid date")
}

/// Monday of [`fixed_today`]'s week.
pub fn fixed_week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 12).expect("valid date")
}

/// An assignment with a due date and effort, in course "Test".
pub fn sample_assignment(id: &str, title: &str, due: &str, minutes: u32) -> Assignment {
    Assignment::new(id, title, "Test")
        .due_date(due)
        .estimated_minutes(minutes)
}

/// Write `assignments` as a JSON fixture named `assignments.json` in `dir`.
pub fn write_fixture(dir: &Path, assignments: &[Assignment]) -> PathBuf {
    let path = dir.join("assignments.json");
    let json = serde_json::to_string_pretty(assignments).expect("assignments serialize");
    std::fs::write(&path, json).expect("write fixture");
    path
}

/// Write raw `contents` as the fixture file in `dir`.
pub fn write_raw_fixture(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("assignments.json");
    std::fs::write(&path, contents).expect("write fixture");
    path
}

// ---------------------------------------------------------------------------
// ScriptedCoursework
// ---------------------------------------------------------------------------

/// A [`CourseworkSource`] that replays queued results.
///
/// Once the queue is drained every further call returns the last result
/// again. Optionally sleeps before answering, to exercise timeouts.
pub struct ScriptedCoursework {
    replies: Mutex<VecDeque<Result<Vec<Assignment>, CourseworkError>>>,
    last: Mutex<Option<Result<Vec<Assignment>, CourseworkError>>>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCoursework {
    pub fn new(
        replies: impl IntoIterator<Item = Result<Vec<Assignment>, CourseworkError>>,
    ) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always succeed with `assignments`.
    pub fn returning(assignments: Vec<Assignment>) -> Self {
        Self::new([Ok(assignments)])
    }

    /// Always fail with `err`.
    pub fn failing(err: CourseworkError) -> Self {
        Self::new([Err(err)])
    }

    /// Sleep for `delay` before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// User ids passed to `fetch_assignments`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CourseworkSource for ScriptedCoursework {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_assignments(&self, user_id: &str) -> Result<Vec<Assignment>, CourseworkError> {
        self.calls.lock().expect("calls lock").push(user_id.to_owned());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        next_reply(&self.replies, &self.last)
            .unwrap_or_else(|| Err(CourseworkError::Unreachable("script exhausted".to_owned())))
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// A [`TextGenerator`] that replays queued results and records prompts.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    last: Mutex<Option<Result<String, GenerationError>>>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new([Ok(text.into())])
    }

    /// Always fail with `err`.
    pub fn failing(err: GenerationError) -> Self {
        Self::new([Err(err)])
    }

    /// Sleep for `delay` before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().expect("prompts lock").push(prompt.to_owned());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        next_reply(&self.replies, &self.last)
            .unwrap_or_else(|| Err(GenerationError::RequestFailed("script exhausted".to_owned())))
    }
}

/// Pop the next queued reply, remembering it; replay the last one when the
/// queue is empty.
fn next_reply<T: Clone>(queue: &Mutex<VecDeque<T>>, last: &Mutex<Option<T>>) -> Option<T> {
    let mut last = last.lock().expect("last lock");
    if let Some(reply) = queue.lock().expect("queue lock").pop_front() {
        *last = Some(reply.clone());
    }
    last.clone()
}

/// A generated plan JSON document with `count` items of `minutes` each.
pub fn generated_plan_json(week_start: &str, count: usize, minutes: u32) -> String {
    let items: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "id": format!("g{i}"),
                "title": format!("Work on part {i}"),
                "estimatedMinutes": minutes,
                "status": "todo",
            })
        })
        .collect();
    serde_json::json!({ "weekStart": week_start, "items": items }).to_string()
}
