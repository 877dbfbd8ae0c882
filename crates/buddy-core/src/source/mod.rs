//! Assignment sourcing with tiered fallback.
//!
//! Tiers are tried in order until one yields a non-empty list:
//!
//! ```text
//! Classroom (needs a user id) --> Fixture file --> Stub (always succeeds)
//! ```
//!
//! Each attempt returns a typed result rather than raising, so the chain is
//! a loop over [`Tier`] values. An authenticated but empty coursework result
//! is treated as a failure: it is more likely a broken integration than a
//! student with nothing to do.

pub mod classroom;
pub mod fixture;
pub mod trait_def;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::model::Assignment;
use crate::planner::stub_assignments;

pub use classroom::ClassroomClient;
pub use fixture::{FixtureError, load_fixture};
pub use trait_def::{AccessTokens, CourseworkError, CourseworkSource, StaticAccessTokens};

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Diagnostic code describing the last tier transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    #[default]
    None,
    ClassroomFailed,
    FixtureInvalid,
    UsingStub,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::ClassroomFailed => "classroom_failed",
            Self::FixtureInvalid => "fixture_invalid",
            Self::UsingStub => "using_stub",
        };
        f.write_str(s)
    }
}

/// Which tier produced the assignments, and why earlier tiers did not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceProvenance {
    pub used_classroom: bool,
    pub used_fixture: bool,
    pub fallback_reason: FallbackReason,
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// A fallible sourcing tier. The stub is the infallible terminal tier and is
/// not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Classroom,
    Fixture,
}

/// Fallible tiers in priority order.
pub const TIERS: [Tier; 2] = [Tier::Classroom, Tier::Fixture];

/// Why a tier produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TierMiss {
    /// Not applicable (no user id, no source, no fixture file). Silent.
    Skipped,
    /// Tried and failed.
    Failed(FallbackReason),
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Selects assignments from the first tier that yields any.
#[derive(Clone)]
pub struct AssignmentResolver {
    coursework: Option<Arc<dyn CourseworkSource>>,
    fixture_path: PathBuf,
    timeout: Duration,
}

impl AssignmentResolver {
    /// A resolver with no remote source, reading the fixture from `config`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            coursework: None,
            fixture_path: config.fixture_path.clone(),
            timeout: config.upstream_timeout,
        }
    }

    /// Enable the remote coursework tier.
    pub fn with_coursework(mut self, source: Arc<dyn CourseworkSource>) -> Self {
        self.coursework = Some(source);
        self
    }

    /// The remote coursework source, when one is configured.
    pub fn coursework(&self) -> Option<&Arc<dyn CourseworkSource>> {
        self.coursework.as_ref()
    }

    /// Per-call limit applied to the remote source.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return a non-empty assignment list and how it was obtained. Never
    /// fails.
    ///
    /// `today` anchors the stub tier's relative due dates.
    pub async fn select_assignments(
        &self,
        user_id: Option<&str>,
        today: NaiveDate,
    ) -> (Vec<Assignment>, SourceProvenance) {
        let mut reason = FallbackReason::None;

        for tier in TIERS {
            match self.attempt(tier, user_id).await {
                Ok(assignments) => {
                    let provenance = SourceProvenance {
                        used_classroom: tier == Tier::Classroom,
                        used_fixture: tier == Tier::Fixture,
                        fallback_reason: reason,
                    };
                    log_selection(&provenance, assignments.len());
                    return (assignments, provenance);
                }
                Err(TierMiss::Skipped) => {}
                Err(TierMiss::Failed(r)) => {
                    reason = r;
                    tracing::warn!(
                        used_classroom = false,
                        used_fixture = false,
                        fallback_reason = %r,
                        "assignment tier failed"
                    );
                }
            }
        }

        let provenance = SourceProvenance {
            used_classroom: false,
            used_fixture: false,
            fallback_reason: FallbackReason::UsingStub,
        };
        let assignments = stub_assignments(today);
        log_selection(&provenance, assignments.len());
        (assignments, provenance)
    }

    async fn attempt(
        &self,
        tier: Tier,
        user_id: Option<&str>,
    ) -> Result<Vec<Assignment>, TierMiss> {
        match tier {
            Tier::Classroom => self.attempt_classroom(user_id).await,
            Tier::Fixture => self.attempt_fixture().await,
        }
    }

    async fn attempt_classroom(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<Assignment>, TierMiss> {
        let (Some(user_id), Some(source)) = (user_id, self.coursework.as_ref()) else {
            return Err(TierMiss::Skipped);
        };
        let failed = TierMiss::Failed(FallbackReason::ClassroomFailed);

        match tokio::time::timeout(self.timeout, source.fetch_assignments(user_id)).await {
            Ok(Ok(mut assignments)) => {
                let fetched = assignments.len();
                assignments.retain(Assignment::is_valid);
                if assignments.len() < fetched {
                    tracing::warn!(
                        source = source.name(),
                        dropped = fetched - assignments.len(),
                        "coursework entries without id or title dropped"
                    );
                }
                if assignments.is_empty() {
                    tracing::info!(
                        source = source.name(),
                        "coursework source returned no assignments"
                    );
                    return Err(failed);
                }
                Ok(assignments)
            }
            Ok(Err(e)) => {
                tracing::warn!(source = source.name(), error = %e, "coursework fetch failed");
                Err(failed)
            }
            Err(_elapsed) => {
                tracing::warn!(
                    source = source.name(),
                    timeout_secs = self.timeout.as_secs_f32(),
                    "coursework fetch timed out"
                );
                Err(failed)
            }
        }
    }

    async fn attempt_fixture(&self) -> Result<Vec<Assignment>, TierMiss> {
        match load_fixture(&self.fixture_path).await {
            Ok(assignments) => Ok(assignments),
            Err(FixtureError::NotFound { .. }) => Err(TierMiss::Skipped),
            Err(e @ FixtureError::Invalid { .. }) => {
                tracing::warn!(error = %e, "fixture rejected");
                Err(TierMiss::Failed(FallbackReason::FixtureInvalid))
            }
        }
    }
}

impl fmt::Debug for AssignmentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssignmentResolver")
            .field("coursework", &self.coursework.as_ref().map(|s| s.name()))
            .field("fixture_path", &self.fixture_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn log_selection(provenance: &SourceProvenance, count: usize) {
    tracing::info!(
        used_classroom = provenance.used_classroom,
        used_fixture = provenance.used_fixture,
        fallback_reason = %provenance.fallback_reason,
        count,
        "assignments source selected"
    );
}
