//! Prompt construction for generative planning and coaching.
//!
//! Pure logic, no I/O. Only a minimized projection of each assignment is
//! ever placed into a prompt.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Assignment, MAX_CHUNK_MINUTES, MAX_PLAN_ITEMS, MIN_CHUNK_MINUTES, PlanItem};

/// The subset of an [`Assignment`] that may be sent to a generator.
///
/// Descriptions and URLs are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub due_date: Option<&'a str>,
    pub course_name: &'a str,
    pub estimated_minutes: Option<u32>,
}

impl<'a> From<&'a Assignment> for AssignmentSummary<'a> {
    fn from(a: &'a Assignment) -> Self {
        Self {
            id: &a.id,
            title: &a.title,
            due_date: a.due_date.as_deref(),
            course_name: &a.course_name,
            estimated_minutes: a.estimated_minutes,
        }
    }
}

/// Serialize the minimized projection of `assignments` as a JSON array.
pub fn assignments_json(assignments: &[Assignment]) -> String {
    let summaries: Vec<AssignmentSummary<'_>> =
        assignments.iter().map(AssignmentSummary::from).collect();
    // Serializing plain strings and integers cannot fail.
    serde_json::to_string(&summaries).unwrap_or_else(|_| "[]".to_owned())
}

/// Output contract included in the planning prompt.
const PLAN_SCHEMA: &str = concat!(
    r#"{ "weekStart": "YYYY-MM-DD", "items": [ { "id": "string", "title": "string", "#,
    r#""dueDate": "ISO8601 or null", "estimatedMinutes": 10-20, "status": "todo|doing|done", "#,
    r#""sourceAssignmentId": "string or null" } ] }"#,
);

/// Build the weekly planning prompt.
pub fn build_plan_prompt(assignments: &[Assignment], week_start: NaiveDate) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "You are a study planner. Output ONLY valid JSON for WeeklyPlan with fields:\n",
    );
    prompt.push_str(PLAN_SCHEMA);
    prompt.push('\n');
    prompt.push_str(&format!(
        "Rules: max {MAX_PLAN_ITEMS} items. Each estimatedMinutes between \
         {MIN_CHUNK_MINUTES} and {MAX_CHUNK_MINUTES} inclusive.\n"
    ));
    prompt.push_str(&format!("weekStart must be {week_start}.\n"));
    prompt.push_str("Prefer titles: Start <assignment>: 15 min (optionally add (1/3) etc).\n");
    prompt.push_str("Assignments JSON:\n");
    prompt.push_str(&assignments_json(assignments));
    prompt.push('\n');

    prompt
}

/// Build the coaching prompt for a chosen action.
pub fn build_coach_prompt(user_message: &str, action: &PlanItem, minutes: u32) -> String {
    let mut prompt = String::with_capacity(512);

    prompt.push_str("You are a supportive study coach. Keep it short (1-3 sentences).\n");
    prompt.push_str(&format!(
        "You MUST include a concrete {MIN_CHUNK_MINUTES}-{MAX_CHUNK_MINUTES} minute \
         starter for the next action.\n"
    ));
    prompt.push_str(&format!("Next action: {}.\n", action.title));
    prompt.push_str(&format!("Starter duration: {minutes} minutes.\n"));
    prompt.push_str(&format!("Student message: {user_message}\n"));

    prompt
}
