//! Deterministic plan synthesis and best-next-action selection.
//!
//! Everything here is pure: the same assignments and the same `today` always
//! produce the same plan. This is the terminal fallback of the pipeline, so
//! it must never fail.

use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

use crate::model::{
    Assignment, DEFAULT_CHUNK_MINUTES, MAX_CHUNK_MINUTES, MIN_CHUNK_MINUTES, PlanItem, PlanStatus,
    WeeklyPlan, clamp_minutes, new_id, unique_id, week_start,
};

/// Title of the generic action used when a plan has nothing to offer.
pub const FALLBACK_ACTION_TITLE: &str = "Start your next assignment: 15 min";

// ---------------------------------------------------------------------------
// Plan generation
// ---------------------------------------------------------------------------

/// Build a weekly plan from `assignments`.
///
/// Assignments are ordered by due date (undated last, then title), split into
/// 10-20 minute chunks, and appended until `cap` items exist. An assignment
/// cut off by the cap keeps its leading chunks.
///
/// Item ids are `<assignment id>-<part>`; a repeat (two assignments sharing
/// an id) gets a fresh random id instead.
pub fn generate_weekly_plan(
    assignments: &[Assignment],
    today: NaiveDate,
    cap: usize,
) -> WeeklyPlan {
    let mut sorted: Vec<&Assignment> = assignments.iter().collect();
    sorted.sort_by_cached_key(|a| sort_key(a));

    let mut items = Vec::with_capacity(cap.min(assignments.len() * 2));
    let mut used_ids = HashSet::new();
    'outer: for assignment in sorted {
        let parts = split_minutes(assignment.estimated_minutes);
        let total_parts = parts.len();
        for (idx, minutes) in parts.into_iter().enumerate() {
            if items.len() >= cap {
                break 'outer;
            }
            let part = idx + 1;
            let candidate = format!("{}-{part}", assignment.id);
            items.push(PlanItem {
                id: unique_id(&mut used_ids, Some(&candidate)),
                title: chunk_title(&assignment.title, minutes, part, total_parts),
                due_date: assignment.due_date.clone(),
                estimated_minutes: minutes,
                status: PlanStatus::Todo,
                source_assignment_id: Some(assignment.id.clone()),
            });
        }
    }

    WeeklyPlan {
        week_start: week_start(today),
        items,
    }
}

/// Split a total effort into chunk durations.
///
/// - `None` -> one default chunk.
/// - up to [`MAX_CHUNK_MINUTES`] -> one chunk, raised to the minimum.
/// - otherwise `ceil(total / 15)` near-equal chunks, the remainder spread
///   one minute at a time over the leading chunks, each clamped into range.
pub fn split_minutes(total: Option<u32>) -> Vec<u32> {
    let Some(total) = total else {
        return vec![DEFAULT_CHUNK_MINUTES];
    };
    if total <= MAX_CHUNK_MINUTES {
        return vec![total.max(MIN_CHUNK_MINUTES)];
    }

    let n = total.div_ceil(DEFAULT_CHUNK_MINUTES);
    let base = total / n;
    let rem = total % n;
    (0..n)
        .map(|i| clamp_minutes(base + u32::from(i < rem)))
        .collect()
}

fn chunk_title(assignment_title: &str, minutes: u32, part: usize, total_parts: usize) -> String {
    if total_parts > 1 {
        format!("Start {assignment_title} ({part}/{total_parts}): {minutes} min")
    } else {
        format!("Start {assignment_title}: {minutes} min")
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// `(undated, due, lowercase title)`; `false` sorts first so dated work leads.
fn sort_key(assignment: &Assignment) -> (bool, NaiveDate, String) {
    let due = assignment.due_date.as_deref().and_then(parse_due_date);
    (
        due.is_none(),
        due.unwrap_or(NaiveDate::MAX),
        assignment.title.to_lowercase(),
    )
}

/// Parse an ISO-8601 date or datetime into its calendar date.
///
/// Returns `None` for anything unparseable; callers treat that as "no due
/// date".
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.date())
        .ok()
}

// ---------------------------------------------------------------------------
// Stub assignments
// ---------------------------------------------------------------------------

/// The fixed offline assignment set, due dates relative to `today`.
pub fn stub_assignments(today: NaiveDate) -> Vec<Assignment> {
    let due_in = |days: u64| {
        today
            .checked_add_days(Days::new(days))
            .unwrap_or(today)
            .to_string()
    };
    vec![
        Assignment::new("a1", "Math problem set 3", "Math")
            .due_date(due_in(2))
            .estimated_minutes(60),
        Assignment::new("a2", "History reading: Chapter 7 notes", "History")
            .due_date(due_in(4))
            .estimated_minutes(30),
        Assignment::new("a3", "English essay draft", "English")
            .due_date(due_in(6))
            .estimated_minutes(90),
    ]
}

// ---------------------------------------------------------------------------
// Best next action
// ---------------------------------------------------------------------------

/// Pick exactly one action from `plan`.
///
/// First `todo` item, else the first item regardless of status, else a
/// synthesized generic starter.
pub fn pick_best_next_action(plan: &WeeklyPlan) -> PlanItem {
    plan.items
        .iter()
        .find(|item| item.status == PlanStatus::Todo)
        .or_else(|| plan.items.first())
        .cloned()
        .unwrap_or_else(fallback_action)
}

/// The generic starter item used when a plan is empty.
pub fn fallback_action() -> PlanItem {
    PlanItem {
        id: new_id(),
        title: FALLBACK_ACTION_TITLE.to_owned(),
        due_date: None,
        estimated_minutes: DEFAULT_CHUNK_MINUTES,
        status: PlanStatus::Todo,
        source_assignment_id: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::MAX_PLAN_ITEMS;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 14).unwrap()
    }

    fn item(id: &str, status: PlanStatus) -> PlanItem {
        PlanItem {
            id: id.to_owned(),
            title: format!("Start {id}: 15 min"),
            due_date: None,
            estimated_minutes: 15,
            status,
            source_assignment_id: None,
        }
    }

    #[test]
    fn split_absent_minutes_is_default_chunk() {
        assert_eq!(split_minutes(None), vec![15]);
    }

    #[test]
    fn split_small_effort_is_raised_to_minimum() {
        assert_eq!(split_minutes(Some(0)), vec![10]);
        assert_eq!(split_minutes(Some(5)), vec![10]);
        assert_eq!(split_minutes(Some(10)), vec![10]);
        assert_eq!(split_minutes(Some(20)), vec![20]);
    }

    #[test]
    fn split_distributes_remainder_to_leading_chunks() {
        assert_eq!(split_minutes(Some(21)), vec![11, 10]);
        assert_eq!(split_minutes(Some(47)), vec![12, 12, 12, 11]);
        assert_eq!(split_minutes(Some(60)), vec![15, 15, 15, 15]);
    }

    #[test]
    fn split_large_efforts_sum_and_stay_in_range() {
        for total in 21..=600 {
            let parts = split_minutes(Some(total));
            assert_eq!(parts.len() as u32, total.div_ceil(15), "total={total}");
            assert_eq!(parts.iter().sum::<u32>(), total, "total={total}");
            assert!(
                parts.iter().all(|m| (10..=20).contains(m)),
                "total={total} parts={parts:?}"
            );
        }
    }

    #[test]
    fn big_assignment_produces_four_distinct_titles() {
        let a = Assignment::new("x", "Big assignment", "Course")
            .due_date("2026-01-20")
            .estimated_minutes(60);
        let plan = generate_weekly_plan(&[a], today(), MAX_PLAN_ITEMS);

        let titles: Vec<&str> = plan.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Start Big assignment (1/4): 15 min",
                "Start Big assignment (2/4): 15 min",
                "Start Big assignment (3/4): 15 min",
                "Start Big assignment (4/4): 15 min",
            ]
        );
        let unique: HashSet<&str> = titles.iter().copied().collect();
        assert_eq!(unique.len(), 4);
        assert!(plan.items.iter().all(|i| i.status == PlanStatus::Todo));
        assert!(
            plan.items
                .iter()
                .all(|i| i.source_assignment_id.as_deref() == Some("x"))
        );
    }

    #[test]
    fn single_chunk_has_no_part_suffix() {
        let a = Assignment::new("x", "Quiz prep", "Course").estimated_minutes(20);
        let plan = generate_weekly_plan(&[a], today(), MAX_PLAN_ITEMS);
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].title, "Start Quiz prep: 20 min");
    }

    #[test]
    fn caps_at_fifteen_items() {
        let many: Vec<Assignment> = (0..50)
            .map(|i| {
                Assignment::new(format!("a{i}"), format!("Task {i}"), "Course")
                    .due_date("2026-01-20")
                    .estimated_minutes(120)
            })
            .collect();
        let plan = generate_weekly_plan(&many, today(), MAX_PLAN_ITEMS);
        assert_eq!(plan.items.len(), MAX_PLAN_ITEMS);
    }

    #[test]
    fn cap_truncates_mid_assignment() {
        // 120 minutes -> 8 chunks; two assignments exceed a cap of 10.
        let a = Assignment::new("a", "Alpha", "C").due_date("2026-01-15").estimated_minutes(120);
        let b = Assignment::new("b", "Beta", "C").due_date("2026-01-16").estimated_minutes(120);
        let plan = generate_weekly_plan(&[a, b], today(), 10);
        assert_eq!(plan.items.len(), 10);
        assert_eq!(plan.items[8].title, "Start Beta (1/8): 15 min");
        assert_eq!(plan.items[9].title, "Start Beta (2/8): 15 min");
    }

    #[test]
    fn shared_assignment_ids_still_yield_distinct_item_ids() {
        let a = Assignment::new("1", "Reading", "C").due_date("2026-01-15").estimated_minutes(30);
        let b = Assignment::new("1", "Worksheet", "C").due_date("2026-01-16").estimated_minutes(30);
        let plan = generate_weekly_plan(&[a, b], today(), MAX_PLAN_ITEMS);

        assert_eq!(plan.items.len(), 4);
        let ids: HashSet<&str> = plan.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), 4, "{:?}", plan.items);
        assert_eq!(plan.items[0].id, "1-1");
        assert_eq!(plan.items[1].id, "1-2");
        assert!(
            plan.items
                .iter()
                .all(|i| i.source_assignment_id.as_deref() == Some("1"))
        );
    }

    #[test]
    fn sorting_respects_due_date() {
        let late = Assignment::new("late", "Later due", "C")
            .due_date("2026-02-13")
            .estimated_minutes(15);
        let none = Assignment::new("none", "No due date", "C").estimated_minutes(15);
        let early = Assignment::new("early", "Earlier due", "C")
            .due_date("2026-02-03")
            .estimated_minutes(15);

        let plan = generate_weekly_plan(&[late, none, early], today(), MAX_PLAN_ITEMS);
        let order: Vec<&str> = plan
            .items
            .iter()
            .filter_map(|i| i.source_assignment_id.as_deref())
            .collect();
        assert_eq!(order, vec!["early", "late", "none"]);
    }

    #[test]
    fn ties_break_on_case_insensitive_title() {
        let b = Assignment::new("b", "beta", "C").due_date("2026-01-20");
        let a = Assignment::new("a", "Alpha", "C").due_date("2026-01-20");
        let plan = generate_weekly_plan(&[b, a], today(), MAX_PLAN_ITEMS);
        assert_eq!(plan.items[0].source_assignment_id.as_deref(), Some("a"));
    }

    #[test]
    fn malformed_due_date_sorts_as_missing() {
        let bad = Assignment::new("bad", "Aardvark", "C").due_date("next tuesday");
        let good = Assignment::new("good", "Zebra", "C").due_date("2026-03-01T09:00:00Z");
        let plan = generate_weekly_plan(&[bad, good], today(), MAX_PLAN_ITEMS);
        assert_eq!(plan.items[0].source_assignment_id.as_deref(), Some("good"));
        // The raw string is still carried through.
        assert_eq!(plan.items[1].due_date.as_deref(), Some("next tuesday"));
    }

    #[test]
    fn datetime_and_date_compare_by_calendar_day() {
        let dt = Assignment::new("dt", "B", "C").due_date("2026-01-20T23:59:00+00:00");
        let d = Assignment::new("d", "A", "C").due_date("2026-01-20");
        let plan = generate_weekly_plan(&[dt, d], today(), MAX_PLAN_ITEMS);
        // Same day: title decides.
        assert_eq!(plan.items[0].source_assignment_id.as_deref(), Some("d"));
    }

    #[test]
    fn parse_due_date_formats() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(parse_due_date("2026-01-20"), Some(d));
        assert_eq!(parse_due_date("2026-01-20T10:00:00Z"), Some(d));
        assert_eq!(parse_due_date("2026-01-20T10:00:00"), Some(d));
        assert_eq!(parse_due_date("2026-01-20T10:00:00.250-05:00"), Some(d));
        assert_eq!(parse_due_date(""), None);
        assert_eq!(parse_due_date("2026-13-01"), None);
    }

    #[test]
    fn empty_input_yields_empty_plan() {
        let plan = generate_weekly_plan(&[], today(), MAX_PLAN_ITEMS);
        assert!(plan.items.is_empty());
        assert_eq!(plan.week_start, NaiveDate::from_ymd_opt(2026, 1, 12).unwrap());
    }

    #[test]
    fn generation_is_deterministic() {
        let stub = stub_assignments(today());
        let a = generate_weekly_plan(&stub, today(), MAX_PLAN_ITEMS);
        let b = generate_weekly_plan(&stub, today(), MAX_PLAN_ITEMS);
        assert_eq!(a, b);
    }

    #[test]
    fn stub_has_three_dated_assignments() {
        let stub = stub_assignments(today());
        assert_eq!(stub.len(), 3);
        assert_eq!(stub[0].due_date.as_deref(), Some("2026-01-16"));
        assert!(stub.iter().all(Assignment::is_valid));
    }

    #[test]
    fn pick_prefers_first_todo() {
        let plan = WeeklyPlan {
            week_start: today(),
            items: vec![item("a", PlanStatus::Doing), item("b", PlanStatus::Todo)],
        };
        assert_eq!(pick_best_next_action(&plan).id, "b");
    }

    #[test]
    fn pick_falls_back_to_first_item() {
        let plan = WeeklyPlan {
            week_start: today(),
            items: vec![item("a", PlanStatus::Done), item("b", PlanStatus::Done)],
        };
        assert_eq!(pick_best_next_action(&plan).id, "a");
    }

    #[test]
    fn pick_on_empty_plan_synthesizes_starter() {
        let action = pick_best_next_action(&WeeklyPlan::empty(today()));
        assert_eq!(action.title, FALLBACK_ACTION_TITLE);
        assert_eq!(action.estimated_minutes, 15);
        assert_eq!(action.status, PlanStatus::Todo);
        assert!(action.due_date.is_none());
        assert!(action.source_assignment_id.is_none());
        assert!(!action.id.is_empty());
    }
}
