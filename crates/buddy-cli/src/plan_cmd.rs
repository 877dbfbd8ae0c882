//! `buddy plan` and `buddy next`: run the pipeline once and print the result.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use buddy_core::coach::{Coach, coach_message_for_action};
use buddy_core::model::{PlanItem, WeeklyPlan};
use buddy_core::orchestrator::{PlanOrchestrator, PlanProvenance};
use buddy_core::planner::pick_best_next_action;

/// JSON shape shared with `GET /plan/week`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub plan: WeeklyPlan,
    pub provenance: PlanProvenance,
    pub best_next_action: PlanItem,
}

impl PlanReport {
    pub fn new(plan: WeeklyPlan, provenance: PlanProvenance) -> Self {
        let best_next_action = pick_best_next_action(&plan);
        Self {
            plan,
            provenance,
            best_next_action,
        }
    }
}

/// Parse `--today`, defaulting to the local calendar date.
pub fn resolve_today(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --today date (expected YYYY-MM-DD): {s}")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Run the `plan` command.
pub async fn run_plan(
    orchestrator: &PlanOrchestrator,
    user_id: Option<&str>,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let (plan, provenance) = orchestrator.produce_plan(user_id, today).await;
    let report = PlanReport::new(plan, provenance);

    if json {
        let out = serde_json::to_string_pretty(&report).context("failed to serialize plan")?;
        println!("{out}");
    } else {
        print!("{}", render_plan(&report));
    }
    Ok(())
}

/// Run the `next` command.
pub async fn run_next(
    orchestrator: &PlanOrchestrator,
    user_id: Option<&str>,
    today: NaiveDate,
) -> Result<()> {
    let (plan, _provenance) = orchestrator.produce_plan(user_id, today).await;
    let action = pick_best_next_action(&plan);
    let coach = Coach::new(orchestrator.generative().clone());
    let message = coach.reply("What should I do next?", &action).await;

    println!("Next: {} ({} min)", action.title, action.estimated_minutes);
    if let Some(due) = &action.due_date {
        println!("Due:  {due}");
    }
    println!();
    println!("{message}");
    Ok(())
}

/// Human-readable rendering of a plan report.
pub fn render_plan(report: &PlanReport) -> String {
    let mut out = String::new();
    let p = &report.provenance;

    let _ = writeln!(out, "Week of {}", report.plan.week_start);
    let _ = writeln!(
        out,
        "Planner: {} (fallback: {})  Source: {} (reason: {})",
        p.planner,
        p.planner_fallback,
        source_label(p),
        p.fallback_reason()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{:>3} {:>4}  {:<6} {:<10}  TITLE", "#", "MIN", "STATUS", "DUE");
    let _ = writeln!(out, "{}", "-".repeat(72));

    for (idx, item) in report.plan.items.iter().enumerate() {
        let due = item
            .due_date
            .as_deref()
            .map(|d| d.get(..10).unwrap_or(d))
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:>3} {:>4}  {:<6} {:<10}  {}",
            idx + 1,
            item.estimated_minutes,
            item.status,
            due,
            item.title
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", coach_message_for_action(&report.best_next_action));
    out
}

fn source_label(p: &PlanProvenance) -> &'static str {
    if p.used_classroom() {
        "classroom"
    } else if p.used_fixture() {
        "fixture"
    } else {
        "stub"
    }
}
