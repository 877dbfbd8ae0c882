//! The planning pipeline end to end.
//!
//! ```text
//! AssignmentResolver --assignments--> GenerativePlanner --text--> JSON
//!        |                                  |                      |
//!        |                       (any failure, or empty) <--- normalize
//!        v                                  v                      |
//!   provenance                  generate_weekly_plan               v
//!                                           \---------------> enforce
//! ```
//!
//! [`PlanOrchestrator::produce_plan`] is total: every failure becomes a
//! fallback plus a provenance code.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::generative::{GenerationError, GenerativePlanner, OpenAiGenerator};
use crate::model::{Assignment, MAX_PLAN_ITEMS, WeeklyPlan, week_start};
use crate::planner::{fallback_action, generate_weekly_plan};
use crate::rails::{enforce, normalize_weekly_plan};
use crate::source::{AssignmentResolver, CourseworkSource, FallbackReason, SourceProvenance};

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Which planner produced the final plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Planner {
    Generative,
    Deterministic,
}

impl fmt::Display for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generative => f.write_str("generative"),
            Self::Deterministic => f.write_str("deterministic"),
        }
    }
}

/// Why the generative planner's output was not used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerFallback {
    #[default]
    None,
    NotConfigured,
    GenerationFailed,
    InvalidJson,
    UnusablePlan,
}

impl fmt::Display for PlannerFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::NotConfigured => "not_configured",
            Self::GenerationFailed => "generation_failed",
            Self::InvalidJson => "invalid_json",
            Self::UnusablePlan => "unusable_plan",
        };
        f.write_str(s)
    }
}

/// Diagnostic metadata attached to every produced plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanProvenance {
    pub planner: Planner,
    pub planner_fallback: PlannerFallback,
    #[serde(flatten)]
    pub source: SourceProvenance,
}

impl PlanProvenance {
    pub fn used_classroom(&self) -> bool {
        self.source.used_classroom
    }

    pub fn used_fixture(&self) -> bool {
        self.source.used_fixture
    }

    pub fn fallback_reason(&self) -> FallbackReason {
        self.source.fallback_reason
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequences sourcing, generative planning and the deterministic fallback.
///
/// Cheap to clone; all collaborators sit behind `Arc`.
#[derive(Debug, Clone)]
pub struct PlanOrchestrator {
    resolver: AssignmentResolver,
    generative: GenerativePlanner,
}

impl PlanOrchestrator {
    pub fn new(resolver: AssignmentResolver, generative: GenerativePlanner) -> Self {
        Self { resolver, generative }
    }

    /// Wire the production collaborators described by `config`.
    ///
    /// The OpenAI generator is enabled when `config.openai` is set.
    /// `coursework` enables the remote tier.
    pub fn from_config(
        config: &PipelineConfig,
        coursework: Option<Arc<dyn CourseworkSource>>,
    ) -> Self {
        let mut resolver = AssignmentResolver::new(config);
        if let Some(source) = coursework {
            resolver = resolver.with_coursework(source);
        }
        let generative = match &config.openai {
            Some(settings) => GenerativePlanner::new(
                Arc::new(OpenAiGenerator::new(settings.clone(), config.upstream_timeout)),
                config.upstream_timeout,
            ),
            None => GenerativePlanner::disabled(),
        };
        Self::new(resolver, generative)
    }

    /// The assignment resolver, shared with the HTTP surface.
    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    /// The generative planner, shared with the coach.
    pub fn generative(&self) -> &GenerativePlanner {
        &self.generative
    }

    /// Produce this week's plan for `user_id`. Never fails and never returns
    /// an empty plan.
    pub async fn produce_plan(
        &self,
        user_id: Option<&str>,
        today: NaiveDate,
    ) -> (WeeklyPlan, PlanProvenance) {
        let (assignments, source) = self.resolver.select_assignments(user_id, today).await;

        let planner_fallback = match self.try_generative(&assignments, today).await {
            Ok(plan) => {
                let plan = enforce(plan, today);
                info!(
                    planner = %Planner::Generative,
                    items = plan.items.len(),
                    "plan produced"
                );
                let provenance = PlanProvenance {
                    planner: Planner::Generative,
                    planner_fallback: PlannerFallback::None,
                    source,
                };
                return (plan, provenance);
            }
            Err(reason) => reason,
        };

        if planner_fallback != PlannerFallback::NotConfigured {
            warn!(planner_fallback = %planner_fallback, "generative plan discarded");
        }

        let mut plan = generate_weekly_plan(&assignments, today, MAX_PLAN_ITEMS);
        if plan.items.is_empty() {
            plan.items.push(fallback_action());
        }
        let plan = enforce(plan, today);
        info!(
            planner = %Planner::Deterministic,
            planner_fallback = %planner_fallback,
            items = plan.items.len(),
            "plan produced"
        );

        let provenance = PlanProvenance {
            planner: Planner::Deterministic,
            planner_fallback,
            source,
        };
        (plan, provenance)
    }

    /// Run the generative path up to (not including) enforcement.
    async fn try_generative(
        &self,
        assignments: &[Assignment],
        today: NaiveDate,
    ) -> Result<WeeklyPlan, PlannerFallback> {
        let raw = match self.generative.request_plan(assignments, week_start(today)).await {
            Ok(raw) => raw,
            Err(GenerationError::NotConfigured) => return Err(PlannerFallback::NotConfigured),
            Err(e) => {
                warn!(error = %e, "plan generation failed");
                return Err(PlannerFallback::GenerationFailed);
            }
        };

        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            warn!(error = %e, chars = raw.len(), "generated plan is not JSON");
            PlannerFallback::InvalidJson
        })?;

        normalize_weekly_plan(&value, today)
            .filter(|plan| !plan.items.is_empty())
            .ok_or(PlannerFallback::UnusablePlan)
    }
}
