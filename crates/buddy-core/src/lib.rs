//! Study Buddy planning core.
//!
//! Turns a student's assignments into a small weekly plan of 10-20 minute
//! "start" actions and picks the single best thing to do next. Every external
//! dependency is optional: when the coursework source, the fixture, or the
//! language model is unavailable the pipeline degrades to the next tier and
//! records why in [`orchestrator::PlanProvenance`].
//!
//! # Architecture
//!
//! ```text
//! PlanOrchestrator::produce_plan(user_id, today)
//!     |
//!     +--> source::AssignmentResolver   classroom -> fixture -> stub
//!     |
//!     +--> generative::GenerativePlanner --> rails::normalize_weekly_plan
//!     |         (on any failure)
//!     +--> planner::generate_weekly_plan
//!     |
//!     +--> rails::enforce ---------------> (WeeklyPlan, PlanProvenance)
//!
//! planner::pick_best_next_action(plan) --> PlanItem --> coach::Coach
//! ```

pub mod coach;
pub mod config;
pub mod generative;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod rails;
pub mod source;
