//! Plan rails: coercion of untrusted plan documents and invariant
//! enforcement.
//!
//! [`normalize_weekly_plan`] turns a loosely-typed JSON document (usually
//! model output) into a [`WeeklyPlan`] or rejects it. [`enforce`] is the
//! last step on every path out of the pipeline and guarantees:
//!
//! - at most [`MAX_PLAN_ITEMS`] items,
//! - every duration within `[MIN_CHUNK_MINUTES, MAX_CHUNK_MINUTES]`,
//! - `week_start` is the Monday of the current week,
//! - every title starts with "Start ".

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::model::{
    MAX_PLAN_ITEMS, MIN_CHUNK_MINUTES, PlanItem, PlanStatus, WeeklyPlan, clamp_minutes, unique_id,
    week_start,
};

const TITLE_PREFIX: &str = "Start ";

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Coerce an arbitrary JSON value into a [`WeeklyPlan`].
///
/// Returns `None` only when the top level is unusable (not an object, or no
/// `items` array). Individual bad entries are dropped rather than failing the
/// whole plan. The candidate's `weekStart` is ignored. Missing, blank or
/// repeated ids are replaced so ids stay unique within the plan.
pub fn normalize_weekly_plan(candidate: &Value, today: NaiveDate) -> Option<WeeklyPlan> {
    let obj = candidate.as_object()?;
    let raw_items = obj.get("items")?.as_array()?;

    let mut used_ids = HashSet::new();
    let items = raw_items
        .iter()
        .take(MAX_PLAN_ITEMS)
        .filter_map(Value::as_object)
        .filter_map(|raw| normalize_item(raw, &mut used_ids))
        .collect();

    Some(WeeklyPlan {
        week_start: week_start(today),
        items,
    })
}

fn normalize_item(raw: &Map<String, Value>, used_ids: &mut HashSet<String>) -> Option<PlanItem> {
    let title = raw
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())?;

    // Negative integers clamp up to the minimum, same as non-integers.
    let estimated_minutes = raw
        .get("estimatedMinutes")
        .and_then(Value::as_u64)
        .map_or(MIN_CHUNK_MINUTES, |v| {
            clamp_minutes(u32::try_from(v).unwrap_or(u32::MAX))
        });

    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<PlanStatus>().ok())
        .unwrap_or_default();

    let id = unique_id(used_ids, raw.get("id").and_then(Value::as_str));

    Some(PlanItem {
        id,
        title: title.to_owned(),
        due_date: string_field(raw, "dueDate"),
        estimated_minutes,
        status,
        source_assignment_id: string_field(raw, "sourceAssignmentId"),
    })
}

fn string_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Enforcement
// ---------------------------------------------------------------------------

/// Force every plan invariant onto `plan`.
///
/// Steps run in a fixed order: truncate items, clamp durations, reset the
/// week start, prefix non-imperative titles. Idempotent.
pub fn enforce(plan: WeeklyPlan, today: NaiveDate) -> WeeklyPlan {
    let items = plan
        .items
        .into_iter()
        .take(MAX_PLAN_ITEMS)
        .map(|item| PlanItem {
            estimated_minutes: clamp_minutes(item.estimated_minutes),
            ..item
        })
        .map(|item| PlanItem {
            title: actionable_title(item.title),
            ..item
        })
        .collect();

    WeeklyPlan {
        week_start: week_start(today),
        items,
    }
}

/// Whether `title` already reads as a "start" instruction (ASCII
/// case-insensitive).
pub fn has_start_prefix(title: &str) -> bool {
    title
        .get(..TITLE_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(TITLE_PREFIX))
}

fn actionable_title(title: String) -> String {
    if has_start_prefix(&title) {
        title
    } else {
        format!("{TITLE_PREFIX}{title}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
